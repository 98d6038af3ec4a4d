//! Cheap statistical screening of the LSB plane
//!
//! The analyzer never extracts payloads or matches signatures; it only
//! measures how far the LSB run structure strays from independent fair bits.

mod runs;
pub mod statistics;

pub use runs::RunLengthAnalyzer;

use crate::error::{StegoError, StegoResult};
use serde::{Deserialize, Serialize};

/// Discrete suspicion classes, ordered by severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SuspicionLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for SuspicionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SuspicionLevel::Low => "low",
            SuspicionLevel::Medium => "medium",
            SuspicionLevel::High => "high",
        };
        f.write_str(s)
    }
}

/// The single test/window that produced the deviation metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakDeviation {
    /// Bit offset of the window in traversal order
    pub window_offset: usize,
    pub test: String,
    /// Signed statistic; the metric is its magnitude
    pub z: f64,
}

/// Result of scoring one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspicionScore {
    pub level: SuspicionLevel,
    /// Largest standardized deviation over all windows and tests
    pub deviation: f64,
    pub bits_analyzed: usize,
    pub windows: usize,
    pub run_count: usize,
    pub expected_run_count: f64,
    pub mean_run_length: f64,
    /// Printable bytes at the start of the LSB plane
    pub text_prefix_bytes: usize,
    pub peak: Option<PeakDeviation>,
}

/// Window size and cut-points for [`RunLengthAnalyzer`].
///
/// Defaults were calibrated on uniform-noise covers: across 240 seeded
/// 256x256 RGB covers the largest deviation seen was 4.70. A 14-byte text
/// payload scores 5.9, a 100-byte script 14 and repetitive payloads above 20.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_window_bits")]
    pub window_bits: usize,

    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,

    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
}

fn default_window_bits() -> usize {
    1024
}

fn default_medium_threshold() -> f64 {
    5.5
}

fn default_high_threshold() -> f64 {
    10.0
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            window_bits: default_window_bits(),
            medium_threshold: default_medium_threshold(),
            high_threshold: default_high_threshold(),
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> StegoResult<()> {
        if self.window_bits < 64 || self.window_bits % 8 != 0 {
            return Err(StegoError::InvalidConfig(format!(
                "window_bits must be a multiple of 8 and at least 64, got {}",
                self.window_bits
            )));
        }
        if !(self.medium_threshold > 0.0 && self.medium_threshold <= self.high_threshold) {
            return Err(StegoError::InvalidConfig(format!(
                "thresholds must satisfy 0 < medium ({}) <= high ({})",
                self.medium_threshold, self.high_threshold
            )));
        }
        Ok(())
    }

    /// Map a deviation magnitude onto a level
    pub fn classify(&self, deviation: f64) -> SuspicionLevel {
        if deviation >= self.high_threshold {
            SuspicionLevel::High
        } else if deviation >= self.medium_threshold {
            SuspicionLevel::Medium
        } else {
            SuspicionLevel::Low
        }
    }
}
