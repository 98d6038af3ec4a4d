//! Typed pixel buffers and the lossless container boundary
//!
//! Every bit the codec writes and the analyzer reads is addressed through
//! [`PixelBuffer`]. The traversal order is row-major, then column, then
//! channel, which is exactly the interleaved order of `data`.

use crate::error::{StegoError, StegoResult};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat};
use serde::{Deserialize, Serialize};

/// Only 8-bit samples are accepted at the boundary
pub const SUPPORTED_BIT_DEPTH: u8 = 8;

const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const GIF_MAGIC: &[u8] = b"GIF8";
const IEND_CHUNK: &[u8] = &[0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44];

/// A decoded bitmap with exact 8-bit channel samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Build a buffer, checking geometry and bit depth
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        bit_depth: u8,
        data: Vec<u8>,
    ) -> StegoResult<Self> {
        if width == 0 || height == 0 {
            return Err(StegoError::malformed(format!(
                "zero-sized image ({}x{})",
                width, height
            )));
        }
        if !(1..=4).contains(&channels) {
            return Err(StegoError::malformed(format!(
                "unsupported channel count {}",
                channels
            )));
        }
        if bit_depth != SUPPORTED_BIT_DEPTH {
            return Err(StegoError::malformed(format!(
                "unsupported bit depth {} (only 8-bit samples carry an LSB plane)",
                bit_depth
            )));
        }

        let expected = width
            .checked_mul(height)
            .and_then(|px| px.checked_mul(channels))
            .ok_or_else(|| StegoError::malformed("image dimensions overflow"))?;

        if data.len() != expected {
            return Err(StegoError::malformed(format!(
                "buffer holds {} samples, {}x{}x{} needs {}",
                data.len(),
                width,
                height,
                channels,
                expected
            )));
        }

        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// One payload bit per channel sample
    pub fn capacity_bits(&self) -> usize {
        self.data.len()
    }

    /// Position of a (row, column, channel) triple in the traversal order
    pub fn traversal_index(&self, row: usize, col: usize, channel: usize) -> Option<usize> {
        if row >= self.height || col >= self.width || channel >= self.channels {
            return None;
        }
        Some((row * self.width + col) * self.channels + channel)
    }

    pub fn sample(&self, row: usize, col: usize, channel: usize) -> Option<u8> {
        self.traversal_index(row, col, channel)
            .map(|idx| self.data[idx])
    }

    /// The LSB plane in traversal order
    pub fn lsb_bits(&self) -> impl Iterator<Item = u8> + '_ {
        self.data.iter().map(|sample| sample & 1)
    }

    /// Copy of this buffer with replaced samples; geometry is unchanged
    pub(crate) fn with_data(&self, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data,
        }
    }
}

/// Image input accepted by a scan request
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Container bytes (PNG)
    Encoded(Vec<u8>),
    /// An already decoded bitmap
    Raw(PixelBuffer),
    /// Container file read during the static scan
    File(std::path::PathBuf),
}

/// Container-level facts gathered while decoding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub format: String,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    /// Bytes found after the PNG end marker
    pub trailing_bytes: usize,
}

/// Decode lossless container bytes into a pixel buffer
pub fn decode_container(bytes: &[u8]) -> StegoResult<(PixelBuffer, ContainerInfo)> {
    if bytes.starts_with(JPEG_MAGIC) {
        return Err(StegoError::malformed(
            "JPEG is lossy; LSB data does not survive recompression",
        ));
    }
    if bytes.starts_with(GIF_MAGIC) {
        return Err(StegoError::malformed("GIF containers are not supported"));
    }
    if !bytes.starts_with(PNG_MAGIC) {
        return Err(StegoError::malformed("unrecognized container signature"));
    }

    let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| StegoError::malformed(format!("PNG decode failed: {}", e)))?;

    let (width, height, channels, data) = match decoded {
        DynamicImage::ImageLuma8(img) => (img.width(), img.height(), 1, img.into_raw()),
        DynamicImage::ImageLumaA8(img) => (img.width(), img.height(), 2, img.into_raw()),
        DynamicImage::ImageRgb8(img) => (img.width(), img.height(), 3, img.into_raw()),
        DynamicImage::ImageRgba8(img) => (img.width(), img.height(), 4, img.into_raw()),
        other => {
            return Err(StegoError::malformed(format!(
                "unsupported color type {:?}",
                other.color()
            )))
        }
    };

    let buffer = PixelBuffer::new(
        width as usize,
        height as usize,
        channels,
        SUPPORTED_BIT_DEPTH,
        data,
    )?;

    let info = ContainerInfo {
        format: "PNG".to_string(),
        width: buffer.width(),
        height: buffer.height(),
        channels: buffer.channels(),
        trailing_bytes: png_trailing_bytes(bytes),
    };

    Ok((buffer, info))
}

/// Encode a pixel buffer as PNG
pub fn encode_png(buffer: &PixelBuffer) -> StegoResult<Vec<u8>> {
    let color = match buffer.channels() {
        1 => ExtendedColorType::L8,
        2 => ExtendedColorType::La8,
        3 => ExtendedColorType::Rgb8,
        _ => ExtendedColorType::Rgba8,
    };
    let width = u32::try_from(buffer.width())
        .map_err(|_| StegoError::malformed("width exceeds PNG limits"))?;
    let height = u32::try_from(buffer.height())
        .map_err(|_| StegoError::malformed("height exceeds PNG limits"))?;

    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(buffer.data(), width, height, color)
        .map_err(|e| StegoError::malformed(format!("PNG encode failed: {}", e)))?;

    Ok(out)
}

/// Count bytes appended after the PNG IEND chunk (length, type, CRC)
pub fn png_trailing_bytes(bytes: &[u8]) -> usize {
    if !bytes.starts_with(PNG_MAGIC) {
        return 0;
    }
    match bytes.windows(IEND_CHUNK.len()).position(|w| w == IEND_CHUNK) {
        Some(pos) => bytes.len().saturating_sub(pos + 12),
        None => 0,
    }
}
