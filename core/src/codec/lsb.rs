//! Sequential LSB codec
//!
//! Payload bytes are written MSB-first, one bit per channel sample, in the
//! traversal order of [`PixelBuffer::lsb_bits`]. A terminator sequence follows
//! the payload so extraction knows where to stop.

use super::{lsb_bytes, pack_lsb, Codec, Extraction};
use crate::bitmap::PixelBuffer;
use crate::error::{StegoError, StegoResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default end marker appended after every payload
pub const DEFAULT_TERMINATOR: &[u8] = b"<<END>>";

/// Tunables for [`LsbCodec`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LsbConfig {
    /// Byte sequence marking the end of the payload
    #[serde(default = "default_terminator")]
    pub terminator: Vec<u8>,

    /// Give up extraction after this many payload bytes
    #[serde(default)]
    pub max_payload_bytes: Option<usize>,
}

fn default_terminator() -> Vec<u8> {
    DEFAULT_TERMINATOR.to_vec()
}

impl Default for LsbConfig {
    fn default() -> Self {
        Self {
            terminator: default_terminator(),
            max_payload_bytes: None,
        }
    }
}

/// Terminator-framed least-significant-bit codec
#[derive(Debug, Clone)]
pub struct LsbCodec {
    config: LsbConfig,
}

impl LsbCodec {
    pub fn new(config: LsbConfig) -> StegoResult<Self> {
        if config.terminator.is_empty() {
            return Err(StegoError::InvalidConfig(
                "terminator must not be empty".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &LsbConfig {
        &self.config
    }

    /// Bits needed for a payload of `len` bytes including the terminator
    pub fn encoded_bits(&self, len: usize) -> usize {
        (len + self.config.terminator.len()) * 8
    }

    /// The terminator must first appear right after the payload
    fn check_framing(&self, payload: &[u8]) -> StegoResult<()> {
        let terminator = &self.config.terminator;
        let mut framed = Vec::with_capacity(payload.len() + terminator.len());
        framed.extend_from_slice(payload);
        framed.extend_from_slice(terminator);

        let first = framed
            .windows(terminator.len())
            .position(|w| w == terminator.as_slice());

        if first == Some(payload.len()) {
            Ok(())
        } else {
            Err(StegoError::TerminatorInPayload)
        }
    }
}

impl Default for LsbCodec {
    fn default() -> Self {
        Self {
            config: LsbConfig::default(),
        }
    }
}

impl Codec for LsbCodec {
    fn name(&self) -> &str {
        "lsb_sequential"
    }

    fn capacity_bits(&self, image: &PixelBuffer) -> usize {
        image.capacity_bits()
    }

    fn max_payload_len(&self, image: &PixelBuffer) -> usize {
        (image.capacity_bits() / 8).saturating_sub(self.config.terminator.len())
    }

    fn embed(&self, image: &PixelBuffer, payload: &[u8]) -> StegoResult<PixelBuffer> {
        let needed_bits = self.encoded_bits(payload.len());
        let available_bits = image.capacity_bits();

        if needed_bits > available_bits {
            return Err(StegoError::CapacityExceeded {
                needed_bits,
                available_bits,
            });
        }
        self.check_framing(payload)?;

        let stego = pack_lsb(image, payload.iter().chain(self.config.terminator.iter()));

        debug!(
            payload_bytes = payload.len(),
            bits = needed_bits,
            capacity = available_bits,
            "embedded payload"
        );

        Ok(stego)
    }

    fn extract(&self, image: &PixelBuffer) -> StegoResult<Extraction> {
        let terminator = self.config.terminator.as_slice();
        let limit = self
            .config
            .max_payload_bytes
            .map(|max| max + terminator.len());

        let mut out = Vec::new();
        for byte in lsb_bytes(image) {
            out.push(byte);

            if out.ends_with(terminator) {
                out.truncate(out.len() - terminator.len());
                debug!(payload_bytes = out.len(), "terminator matched");
                return Ok(Extraction::Found(out));
            }
            if limit.is_some_and(|limit| out.len() >= limit) {
                debug!(limit = ?limit, "extraction limit reached without terminator");
                return Ok(Extraction::NotFound);
            }
        }

        Ok(Extraction::NotFound)
    }
}
