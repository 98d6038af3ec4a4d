//! Scan configuration
//!
//! Parsed from JSON the same way skill parameters are, with every field
//! optional.

use crate::analysis::AnalyzerConfig;
use crate::codec::{Codec, FileCodec, Framing, LsbCodec, LsbConfig};
use crate::error::{StegoError, StegoResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    pub codec: LsbConfig,

    /// Payload framing the pipeline extracts with
    #[serde(default)]
    pub framing: Framing,

    /// Deadline for one signature-matcher call
    #[serde(default = "default_signature_timeout_ms")]
    pub signature_timeout_ms: u64,

    /// Deadline for one reputation lookup
    #[serde(default = "default_reputation_timeout_ms")]
    pub reputation_timeout_ms: u64,

    /// Worker threads per collaborator; a hung call holds its worker
    #[serde(default = "default_collaborator_workers")]
    pub collaborator_workers: usize,

    /// JSON rule file replacing the built-in rules
    #[serde(default)]
    pub rules: Option<PathBuf>,

    /// Known-bad SHA-256 list enabling offline reputation
    #[serde(default)]
    pub known_bad_hashes: Option<PathBuf>,
}

fn default_signature_timeout_ms() -> u64 {
    2_000
}

fn default_reputation_timeout_ms() -> u64 {
    5_000
}

fn default_collaborator_workers() -> usize {
    4
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            codec: LsbConfig::default(),
            framing: Framing::default(),
            signature_timeout_ms: default_signature_timeout_ms(),
            reputation_timeout_ms: default_reputation_timeout_ms(),
            collaborator_workers: default_collaborator_workers(),
            rules: None,
            known_bad_hashes: None,
        }
    }
}

impl ScanConfig {
    pub fn from_value(value: &Value) -> StegoResult<Self> {
        let config: Self = serde_json::from_value(value.clone())
            .map_err(|e| StegoError::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> StegoResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        Self::from_value(&value)
    }

    pub fn validate(&self) -> StegoResult<()> {
        self.analyzer.validate()?;
        if self.codec.terminator.is_empty() {
            return Err(StegoError::InvalidConfig(
                "terminator must not be empty".to_string(),
            ));
        }
        if self.signature_timeout_ms == 0 || self.reputation_timeout_ms == 0 {
            return Err(StegoError::InvalidConfig(
                "collaborator timeouts must be positive".to_string(),
            ));
        }
        if self.collaborator_workers == 0 {
            return Err(StegoError::InvalidConfig(
                "collaborator_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Codec matching the configured framing
    pub fn build_codec(&self) -> StegoResult<Arc<dyn Codec>> {
        Ok(match self.framing {
            Framing::Terminator => Arc::new(LsbCodec::new(self.codec.clone())?),
            Framing::LengthPrefixed => Arc::new(FileCodec::new()),
        })
    }

    pub fn signature_timeout(&self) -> Duration {
        Duration::from_millis(self.signature_timeout_ms)
    }

    pub fn reputation_timeout(&self) -> Duration {
        Duration::from_millis(self.reputation_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = ScanConfig::from_value(&json!({})).unwrap();
        assert_eq!(config, ScanConfig::default());
        assert_eq!(config.codec.terminator, b"<<END>>".to_vec());
        assert_eq!(config.signature_timeout(), Duration::from_secs(2));
        assert_eq!(config.collaborator_workers, 4);
    }

    #[test]
    fn test_partial_override() {
        let config = ScanConfig::from_value(&json!({
            "analyzer": { "medium_threshold": 6.0 },
            "codec": { "max_payload_bytes": 2000 },
            "reputation_timeout_ms": 250
        }))
        .unwrap();

        assert_eq!(config.analyzer.medium_threshold, 6.0);
        assert_eq!(config.analyzer.window_bits, 1024);
        assert_eq!(config.codec.max_payload_bytes, Some(2000));
        assert_eq!(config.reputation_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_framing_selects_codec() {
        assert_eq!(ScanConfig::default().build_codec().unwrap().name(), "lsb_sequential");

        let config = ScanConfig::from_value(&json!({ "framing": "length_prefixed" })).unwrap();
        assert_eq!(config.framing, Framing::LengthPrefixed);
        assert_eq!(config.build_codec().unwrap().name(), "lsb_length_prefixed");

        assert!(ScanConfig::from_value(&json!({ "framing": "zigzag" })).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ScanConfig::from_value(&json!({ "codec": { "terminator": [] } })).is_err());
        assert!(ScanConfig::from_value(&json!({ "signature_timeout_ms": 0 })).is_err());
        assert!(ScanConfig::from_value(&json!({ "collaborator_workers": 0 })).is_err());
        assert!(ScanConfig::from_value(&json!({ "analyzer": { "window_bits": 12 } })).is_err());
        assert!(ScanConfig::from_value(&json!({ "analyzer": "fast" })).is_err());
    }
}
