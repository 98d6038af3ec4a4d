//! StegoTriage Core
//!
//! LSB steganography codec and a gated detection pipeline for images that may
//! carry hidden payloads.
//!
//! # Overview
//!
//! - **Codec**: hides and recovers a terminator-framed byte payload in the
//!   least-significant bit of every channel sample ([`codec::LsbCodec`]).
//! - **Analyzer**: scores the LSB plane's run structure against a fair-coin
//!   null model ([`analysis::RunLengthAnalyzer`]).
//! - **Pipeline**: static checks, then suspicion scoring, then extraction and
//!   signature matching only for suspicious images
//!   ([`pipeline::PipelineController`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use stegotriage_core::{Codec, ImageSource, LsbCodec, PipelineController, ScanConfig};
//!
//! let codec = LsbCodec::default();
//! let stego = codec.embed(&cover, b"import socket; s.connect(addr)")?;
//!
//! let pipeline = PipelineController::new(&ScanConfig::default())?;
//! let verdict = pipeline.scan(ImageSource::Raw(stego));
//! println!("{}", verdict.classification());
//! ```

pub mod analysis;
pub mod bitmap;
pub mod codec;
pub mod config;
pub mod detectors;
pub mod error;
pub mod pipeline;
pub mod reputation;
pub mod signature;
pub mod skills;

#[cfg(test)]
pub(crate) mod testutil;

pub use analysis::{AnalyzerConfig, RunLengthAnalyzer, SuspicionLevel, SuspicionScore};
pub use bitmap::{decode_container, encode_png, ImageSource, PixelBuffer};
pub use codec::{Codec, Extraction, FileCodec, Framing, HiddenFile, LsbCodec, LsbConfig};
pub use config::ScanConfig;
pub use error::{StegoError, StegoResult};
pub use pipeline::{
    BatchItem, BatchOutcome, BatchScanner, CallGuard, CancellationToken, Classification,
    Evidence, EvidenceKind, PipelineController, ScanContext, Stage, VerdictRecord,
};
pub use reputation::{HashListReputation, PayloadDigest, Reputation, ReputationService};
pub use signature::{RuleSet, SignatureMatch, SignatureMatcher};
pub use skills::{
    create_default_registry, create_registry, Finding, ScanParams, Severity, Skill, SkillError,
    SkillOutput, SkillRegistry, SkillResult,
};

use std::path::Path;
use std::sync::Arc;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Scan a PNG file, or every PNG in a directory, and return the verdicts
pub fn scan_path(
    path: &Path,
    recursive: bool,
    config: &ScanConfig,
) -> StegoResult<Vec<VerdictRecord>> {
    let controller = Arc::new(PipelineController::new(config)?);

    if path.is_file() {
        let ctx = ScanContext::new(path.display().to_string());
        return Ok(vec![
            controller.scan_with_context(ctx, ImageSource::File(path.to_path_buf()))
        ]);
    }
    if !path.is_dir() {
        return Err(StegoError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }

    let verdicts = BatchScanner::new(controller)
        .scan_directory(path, recursive)
        .into_iter()
        .filter_map(|outcome| match outcome {
            BatchOutcome::Completed(verdict) => Some(verdict),
            BatchOutcome::Skipped { .. } => None,
        })
        .collect();

    Ok(verdicts)
}

/// Export all skill schemas for tool-calling clients
pub fn export_tool_schemas() -> serde_json::Value {
    let registry = create_default_registry();
    registry.export_schemas()
}
