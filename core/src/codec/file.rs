//! Length-prefixed LSB codec for arbitrary files
//!
//! The plane carries `<size>:<ext><<HEADER>>` followed by exactly `size` raw
//! bytes. The length header makes any byte sequence embeddable, including
//! ones that contain a terminator.

use super::{lsb_bytes, pack_lsb, Codec, Extraction};
use crate::bitmap::PixelBuffer;
use crate::error::{StegoError, StegoResult};
use tracing::debug;

/// Marker closing the size/extension header
pub const HEADER_MARKER: &[u8] = b"<<HEADER>>";

/// Longest extension kept in a header, dot included
const MAX_EXTENSION_LEN: usize = 16;

/// Header bytes scanned before giving up: digits, colon, extension, marker
const MAX_HEADER_LEN: usize = 20 + 1 + MAX_EXTENSION_LEN + HEADER_MARKER.len();

/// A file recovered from (or destined for) the LSB plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenFile {
    /// Extension as stored, e.g. `.zip`; may be empty
    pub extension: String,
    pub data: Vec<u8>,
}

/// Length-prefixed least-significant-bit codec
#[derive(Debug, Clone, Default)]
pub struct FileCodec {
    extension: String,
}

impl FileCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec whose [`Codec::embed`] records `extension` in the header
    pub fn with_extension(extension: impl Into<String>) -> StegoResult<Self> {
        let extension = extension.into();
        validate_extension(&extension)?;
        Ok(Self { extension })
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Bits needed for `len` data bytes with this codec's header
    pub fn encoded_bits(&self, len: usize) -> usize {
        (header(len, &self.extension).len() + len) * 8
    }

    pub fn embed_file(&self, image: &PixelBuffer, file: &HiddenFile) -> StegoResult<PixelBuffer> {
        validate_extension(&file.extension)?;

        let head = header(file.data.len(), &file.extension);
        let needed_bits = (head.len() + file.data.len()) * 8;
        let available_bits = image.capacity_bits();
        if needed_bits > available_bits {
            return Err(StegoError::CapacityExceeded {
                needed_bits,
                available_bits,
            });
        }

        debug!(
            payload_bytes = file.data.len(),
            extension = %file.extension,
            bits = needed_bits,
            "embedded length-prefixed file"
        );
        Ok(pack_lsb(image, head.iter().chain(file.data.iter())))
    }

    /// Recover a file; `None` when the plane carries no valid header
    pub fn extract_file(&self, image: &PixelBuffer) -> StegoResult<Option<HiddenFile>> {
        let mut bytes = lsb_bytes(image);

        let mut head = Vec::with_capacity(MAX_HEADER_LEN);
        loop {
            if head.ends_with(HEADER_MARKER) {
                break;
            }
            if head.len() >= MAX_HEADER_LEN {
                return Ok(None);
            }
            match bytes.next() {
                Some(byte) => head.push(byte),
                None => return Ok(None),
            }
        }

        let Some((size, extension)) = parse_header(&head[..head.len() - HEADER_MARKER.len()])
        else {
            return Ok(None);
        };

        let remaining = image.capacity_bits() / 8 - head.len();
        if size > remaining {
            debug!(size, remaining, "header size exceeds image capacity");
            return Ok(None);
        }

        let data: Vec<u8> = bytes.take(size).collect();
        Ok(Some(HiddenFile { extension, data }))
    }
}

impl Codec for FileCodec {
    fn name(&self) -> &str {
        "lsb_length_prefixed"
    }

    fn capacity_bits(&self, image: &PixelBuffer) -> usize {
        image.capacity_bits()
    }

    fn max_payload_len(&self, image: &PixelBuffer) -> usize {
        let capacity = image.capacity_bits() / 8;
        let fits = |len: usize| header(len, &self.extension).len() + len <= capacity;

        if !fits(0) {
            return 0;
        }
        // The header grows by one byte per extra size digit
        let mut len = capacity.saturating_sub(header(capacity, &self.extension).len());
        while fits(len + 1) {
            len += 1;
        }
        len
    }

    fn embed(&self, image: &PixelBuffer, payload: &[u8]) -> StegoResult<PixelBuffer> {
        self.embed_file(
            image,
            &HiddenFile {
                extension: self.extension.clone(),
                data: payload.to_vec(),
            },
        )
    }

    fn extract(&self, image: &PixelBuffer) -> StegoResult<Extraction> {
        Ok(match self.extract_file(image)? {
            Some(file) => Extraction::Found(file.data),
            None => Extraction::NotFound,
        })
    }
}

fn header(len: usize, extension: &str) -> Vec<u8> {
    let mut head = format!("{}:{}", len, extension).into_bytes();
    head.extend_from_slice(HEADER_MARKER);
    head
}

fn validate_extension(extension: &str) -> StegoResult<()> {
    let valid = extension.len() <= MAX_EXTENSION_LEN
        && extension
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(StegoError::InvalidConfig(format!(
            "unsupported file extension '{}'",
            extension
        )))
    }
}

/// `<digits>:<ext>`, rejecting anything a clean image could produce by chance
fn parse_header(head: &[u8]) -> Option<(usize, String)> {
    let text = std::str::from_utf8(head).ok()?;
    let (size, extension) = text.split_once(':')?;

    if size.is_empty() || !size.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    validate_extension(extension).ok()?;

    Some((size.parse().ok()?, extension.to_string()))
}
