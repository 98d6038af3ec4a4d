//! Embed/extract strategies over the LSB plane
//!
//! The detection pipeline only sees the [`Codec`] trait, so alternative
//! strategies plug in without touching the stage logic.

mod file;
mod lsb;

pub use file::{FileCodec, HiddenFile, HEADER_MARKER};
pub use lsb::{LsbCodec, LsbConfig, DEFAULT_TERMINATOR};

use crate::bitmap::PixelBuffer;
use crate::error::StegoResult;
use serde::{Deserialize, Serialize};

/// How a payload is framed inside the LSB plane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Payload followed by a terminator sequence ([`LsbCodec`])
    #[default]
    Terminator,
    /// `<size>:<ext><<HEADER>>` followed by raw bytes ([`FileCodec`])
    LengthPrefixed,
}

/// Outcome of an extraction attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Payload recovered up to (not including) the terminator
    Found(Vec<u8>),
    /// No terminator before capacity ran out; the normal result for clean images
    NotFound,
}

impl Extraction {
    pub fn is_found(&self) -> bool {
        matches!(self, Extraction::Found(_))
    }

    pub fn into_payload(self) -> Option<Vec<u8>> {
        match self {
            Extraction::Found(bytes) => Some(bytes),
            Extraction::NotFound => None,
        }
    }
}

/// A reversible payload-hiding strategy
pub trait Codec: Send + Sync {
    /// Identifier recorded in verdict evidence
    fn name(&self) -> &str;

    /// Raw bit capacity of `image` under this strategy
    fn capacity_bits(&self, image: &PixelBuffer) -> usize;

    /// Largest payload, in bytes, that [`Codec::embed`] accepts for `image`
    fn max_payload_len(&self, image: &PixelBuffer) -> usize;

    /// Hide `payload`, returning a new image. Must not partially embed on failure.
    fn embed(&self, image: &PixelBuffer, payload: &[u8]) -> StegoResult<PixelBuffer>;

    /// Recover a payload previously hidden with [`Codec::embed`]
    fn extract(&self, image: &PixelBuffer) -> StegoResult<Extraction>;
}

/// Write `bytes` MSB-first into the leading LSBs of `image`.
///
/// Callers check capacity first; samples past the stream are left untouched.
pub(crate) fn pack_lsb<'a, I>(image: &PixelBuffer, bytes: I) -> PixelBuffer
where
    I: IntoIterator<Item = &'a u8>,
{
    let bits = bytes
        .into_iter()
        .flat_map(|&byte| (0..8).rev().map(move |shift| (byte >> shift) & 1));

    let mut data = image.data().to_vec();
    for (sample, bit) in data.iter_mut().zip(bits) {
        *sample = (*sample & !1) | bit;
    }
    image.with_data(data)
}

/// Bytes of the LSB plane, assembled MSB-first; a trailing partial byte is dropped
pub(crate) fn lsb_bytes(image: &PixelBuffer) -> impl Iterator<Item = u8> + '_ {
    image
        .data()
        .chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |byte, sample| (byte << 1) | (sample & 1)))
}
