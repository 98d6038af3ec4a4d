//! Skill trait - the tool-calling interface over the pipeline
//!
//! Each skill exposes a JSON schema so it can be invoked as a function call
//! and returns findings in a uniform shape.

use crate::error::StegoError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during skill execution
#[derive(Error, Debug)]
pub enum SkillError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scan failed: {0}")]
    Scan(#[from] StegoError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SkillResult<T> = Result<T, SkillError>;

/// A finding from skill execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Type of finding (e.g., "lsb_payload", "lsb_anomaly")
    pub finding_type: String,

    /// The detected value or pattern
    pub value: Value,

    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,

    /// Location where finding was detected
    pub location: String,

    pub severity: Severity,

    #[serde(default)]
    pub metadata: Value,
}

/// Severity levels for findings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// Output from skill execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillOutput {
    pub findings: Vec<Finding>,

    /// Overall confidence in results
    pub confidence: f32,

    /// Execution metadata (counts, degradation, etc.)
    #[serde(default)]
    pub metadata: Value,

    /// Whether every target was scanned
    pub complete: bool,
}

impl SkillOutput {
    pub fn empty() -> Self {
        Self {
            findings: Vec::new(),
            confidence: 1.0,
            metadata: Value::Null,
            complete: true,
        }
    }

    pub fn with_findings(findings: Vec<Finding>) -> Self {
        let confidence = if findings.is_empty() {
            1.0
        } else {
            findings.iter().map(|f| f.confidence).sum::<f32>() / findings.len() as f32
        };

        Self {
            findings,
            confidence,
            metadata: Value::Null,
            complete: true,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The core Skill trait
pub trait Skill: Send + Sync {
    /// Unique identifier for this skill
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for tool calling (OpenAI/Anthropic compatible)
    fn schema(&self) -> Value;

    fn execute(&self, params: Value) -> SkillResult<SkillOutput>;

    /// Minimum confidence threshold for reporting findings
    fn confidence_threshold(&self) -> f32 {
        0.7
    }

    fn categories(&self) -> Vec<&str> {
        vec![]
    }
}

/// Parameters shared by the image skills
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanParams {
    /// PNG file or directory
    pub path: String,

    #[serde(default)]
    pub recursive: bool,

    /// Report clean verdicts as informational findings
    #[serde(default)]
    pub include_clean: bool,
}

impl ScanParams {
    pub fn from_value(params: &Value) -> SkillResult<Self> {
        serde_json::from_value(params.clone()).map_err(|e| {
            SkillError::InvalidParams(format!("Failed to parse scan params: {}", e))
        })
    }

    pub fn path(&self) -> &Path {
        Path::new(&self.path)
    }
}

/// Helper to build JSON schemas for skills
pub mod schema {
    use serde_json::{json, Value};

    pub fn string_param(description: &str) -> Value {
        json!({
            "type": "string",
            "description": description
        })
    }

    pub fn bool_param(description: &str, default: bool) -> Value {
        json!({
            "type": "boolean",
            "description": description,
            "default": default
        })
    }

    pub fn skill_schema(
        name: &str,
        description: &str,
        properties: Value,
        required: Vec<&str>,
    ) -> Value {
        json!({
            "name": name,
            "description": description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required
            }
        })
    }
}
