#![allow(dead_code)]

use stegotriage_core::{
    Codec, Extraction, LsbCodec, PayloadDigest, PixelBuffer, Reputation, ReputationService,
    RuleSet, SignatureMatch, SignatureMatcher, StegoError, StegoResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

pub const REVERSE_SHELL: &[u8] = b"import socket\n\
    s = socket.socket()\n\
    s.connect(('127.0.0.1', 4444))\n\
    print(\"REVERSE SHELL CONNECTED!\")";

/// Plain ASCII with no rule hits
pub const MEETING_NOTES: &[u8] = b"Meeting notes: \
    the quarterly review moved to Thursday afternoon. \
    Bring the printed slides, the budget summary and the hiring plan for next year.";

pub fn splitmix_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    let mut out = Vec::with_capacity(len + 8);
    while out.len() < len {
        state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        out.extend_from_slice(&z.to_le_bytes());
    }
    out.truncate(len);
    out
}

/// Uniform noise cover; its LSB plane is indistinguishable from fair coin flips
pub fn random_image(width: usize, height: usize, channels: usize, seed: u64) -> PixelBuffer {
    PixelBuffer::new(
        width,
        height,
        channels,
        8,
        splitmix_bytes(width * height * channels, seed),
    )
    .unwrap()
}

pub fn stego_image(payload: &[u8]) -> PixelBuffer {
    LsbCodec::default()
        .embed(&random_image(256, 256, 3, 7), payload)
        .unwrap()
}

#[derive(Default)]
pub struct CountingCodec {
    inner: LsbCodec,
    extracts: AtomicUsize,
}

impl CountingCodec {
    pub fn extracts(&self) -> usize {
        self.extracts.load(Ordering::SeqCst)
    }
}

impl Codec for CountingCodec {
    fn name(&self) -> &str {
        "counting"
    }

    fn capacity_bits(&self, image: &PixelBuffer) -> usize {
        self.inner.capacity_bits(image)
    }

    fn max_payload_len(&self, image: &PixelBuffer) -> usize {
        self.inner.max_payload_len(image)
    }

    fn embed(&self, image: &PixelBuffer, payload: &[u8]) -> StegoResult<PixelBuffer> {
        self.inner.embed(image, payload)
    }

    fn extract(&self, image: &PixelBuffer) -> StegoResult<Extraction> {
        self.extracts.fetch_add(1, Ordering::SeqCst);
        self.inner.extract(image)
    }
}

#[derive(Default)]
pub struct CountingMatcher {
    inner: RuleSet,
    calls: AtomicUsize,
}

impl CountingMatcher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SignatureMatcher for CountingMatcher {
    fn name(&self) -> &str {
        "counting_rules"
    }

    fn match_bytes(&self, payload: &[u8]) -> StegoResult<Vec<SignatureMatch>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.match_bytes(payload)
    }
}

pub struct SlowMatcher(pub Duration);

impl SignatureMatcher for SlowMatcher {
    fn name(&self) -> &str {
        "slow_rules"
    }

    fn match_bytes(&self, _payload: &[u8]) -> StegoResult<Vec<SignatureMatch>> {
        thread::sleep(self.0);
        Ok(Vec::new())
    }
}

pub struct OfflineReputation;

impl ReputationService for OfflineReputation {
    fn name(&self) -> &str {
        "offline_feed"
    }

    fn lookup(&self, _digest: &PayloadDigest) -> StegoResult<Reputation> {
        Err(StegoError::unavailable("offline_feed", "connection refused"))
    }
}

pub struct SlowReputation(pub Duration);

impl ReputationService for SlowReputation {
    fn name(&self) -> &str {
        "slow_feed"
    }

    fn lookup(&self, _digest: &PayloadDigest) -> StegoResult<Reputation> {
        thread::sleep(self.0);
        Ok(Reputation::Unknown)
    }
}
