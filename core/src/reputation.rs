//! Payload reputation lookups
//!
//! Reputation is confirmation only: an unavailable service lowers confidence
//! in a verdict but never prevents one.

use crate::error::StegoResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// Content address of an extracted payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayloadDigest {
    /// Lowercase hex SHA-256
    pub sha256: String,
    pub len: usize,
}

impl PayloadDigest {
    pub fn of(payload: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        Self {
            sha256: format!("{:x}", hasher.finalize()),
            len: payload.len(),
        }
    }
}

/// What a reputation source knows about a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reputation {
    KnownMalicious { source: String, detections: u32 },
    KnownBenign { source: String },
    Unknown,
}

impl Reputation {
    pub fn is_malicious(&self) -> bool {
        matches!(self, Reputation::KnownMalicious { .. })
    }
}

/// External reputation/threat-intelligence contract
pub trait ReputationService: Send + Sync {
    fn name(&self) -> &str;

    fn lookup(&self, digest: &PayloadDigest) -> StegoResult<Reputation>;
}

/// Offline reputation from a list of known-bad SHA-256 digests
#[derive(Debug, Clone, Default)]
pub struct HashListReputation {
    source: String,
    known_bad: HashSet<String>,
}

impl HashListReputation {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            known_bad: HashSet::new(),
        }
    }

    pub fn insert(&mut self, sha256: &str) {
        self.known_bad.insert(sha256.trim().to_ascii_lowercase());
    }

    /// One hex digest per line; blank lines and `#` comments are skipped
    pub fn from_lines(source: impl Into<String>, text: &str) -> Self {
        let mut list = Self::new(source);
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            list.insert(line);
        }
        list
    }

    pub fn from_file(path: &Path) -> StegoResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_lines(path.display().to_string(), &text))
    }

    pub fn len(&self) -> usize {
        self.known_bad.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known_bad.is_empty()
    }
}

impl ReputationService for HashListReputation {
    fn name(&self) -> &str {
        "hash_list"
    }

    fn lookup(&self, digest: &PayloadDigest) -> StegoResult<Reputation> {
        if self.known_bad.contains(&digest.sha256) {
            Ok(Reputation::KnownMalicious {
                source: self.source.clone(),
                detections: 1,
            })
        } else {
            Ok(Reputation::Unknown)
        }
    }
}
