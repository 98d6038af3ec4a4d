//! Windowed run-length analysis of the LSB plane

use super::statistics::{
    expected_runs, leading_run_z, run_count, run_length_chi_z, run_lengths, runs_z,
};
use super::{AnalyzerConfig, PeakDeviation, SuspicionScore};
use crate::bitmap::PixelBuffer;
use crate::error::StegoResult;
use tracing::debug;

/// Bits per byte lane; embedded payloads are byte-aligned from index 0
const LANES: usize = 8;

/// Histogram buckets for the run-length chi-square (1..=5 and 6+)
const RUN_BUCKETS: usize = 6;

/// Windows shorter than this skip the chi-square test
const MIN_CHI_BITS: usize = 64;

/// Share of byte values that are printable ASCII or tab/LF/CR
const TEXT_BYTE_PROBABILITY: f64 = 98.0 / 256.0;

/// Scores images by comparing LSB run statistics with a fair-coin null.
///
/// For every window three families of tests run:
/// - serial runs count over the window
/// - run-length histogram chi-square
/// - runs count over each byte lane (every 8th bit)
///
/// Text and other structured payloads fix or bias whole byte lanes (ASCII
/// never sets bit 7), which the lane tests pick up even when the serial
/// run count looks natural.
///
/// A short payload barely moves a 1024-bit window, so one more test is
/// anchored at traversal index 0 where every payload starts: the run of
/// leading bytes (assembled MSB-first, as the codec writes them) that are
/// printable text. With the terminator appended, any text payload of 12 or
/// more bytes reaches Medium on this test alone.
#[derive(Debug, Clone, Default)]
pub struct RunLengthAnalyzer {
    config: AnalyzerConfig,
}

impl RunLengthAnalyzer {
    pub fn new(config: AnalyzerConfig) -> StegoResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Score `image`. Deterministic and O(samples).
    pub fn score(&self, image: &PixelBuffer) -> SuspicionScore {
        let bits: Vec<u8> = image.lsb_bits().collect();
        let n = bits.len();
        let window = self.config.window_bits;

        let mut deviation = 0.0f64;
        let mut peak = None;
        let mut windows = 0;

        for offset in (0..n).step_by(window) {
            let end = (offset + window).min(n);
            // A trailing partial window only counts when it is the whole plane
            if end - offset < window && offset > 0 {
                continue;
            }
            windows += 1;

            for (test, z) in window_tests(&bits[offset..end]) {
                if z.abs() > deviation {
                    deviation = z.abs();
                    peak = Some(PeakDeviation {
                        window_offset: offset,
                        test,
                        z,
                    });
                }
            }
        }

        let text_prefix_bytes = leading_text_bytes(&bits);
        let prefix_z = leading_run_z(text_prefix_bytes, TEXT_BYTE_PROBABILITY);
        if prefix_z > deviation {
            deviation = prefix_z;
            peak = Some(PeakDeviation {
                window_offset: 0,
                test: "text_prefix".to_string(),
                z: prefix_z,
            });
        }

        let runs = run_count(bits.iter().copied());
        let mean_run_length = if runs == 0 {
            0.0
        } else {
            n as f64 / runs as f64
        };
        let level = self.config.classify(deviation);

        debug!(
            bits = n,
            windows,
            runs,
            text_prefix_bytes,
            deviation,
            level = %level,
            "scored LSB plane"
        );

        SuspicionScore {
            level,
            deviation,
            bits_analyzed: n,
            windows,
            run_count: runs,
            expected_run_count: expected_runs(n),
            mean_run_length,
            text_prefix_bytes,
            peak,
        }
    }
}

/// Leading bytes of the LSB plane that decode to printable text
fn leading_text_bytes(bits: &[u8]) -> usize {
    bits.chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |byte, &bit| (byte << 1) | bit))
        .take_while(|&byte| matches!(byte, b'\t' | b'\n' | b'\r' | 0x20..=0x7E))
        .count()
}

/// All statistics for one window, in a fixed order
fn window_tests(bits: &[u8]) -> Vec<(String, f64)> {
    let mut tests = Vec::with_capacity(2 + LANES);

    let runs = run_lengths(bits);
    tests.push(("serial_runs".to_string(), runs_z(bits.len(), runs.len())));

    if bits.len() >= MIN_CHI_BITS {
        tests.push((
            "run_length_chi2".to_string(),
            run_length_chi_z(&runs, RUN_BUCKETS),
        ));
    }

    for lane in 0..LANES {
        let lane_bits = bits.iter().skip(lane).step_by(LANES).copied();
        let n = bits.len().saturating_sub(lane).div_ceil(LANES);
        tests.push((format!("byte_lane_{}", lane), runs_z(n, run_count(lane_bits))));
    }

    tests
}
