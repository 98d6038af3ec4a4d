//! Payload Extractor
//!
//! Recovers an LSB payload from a single PNG without any screening.

use crate::bitmap::decode_container;
use crate::codec::Extraction;
use crate::pipeline::{ExtractedPayload, PipelineController};
use crate::skills::{
    schema, Finding, ScanParams, Severity, Skill, SkillError, SkillOutput, SkillResult,
};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;

pub struct PayloadExtractor {
    controller: Arc<PipelineController>,
}

impl PayloadExtractor {
    pub fn new(controller: Arc<PipelineController>) -> Self {
        Self { controller }
    }
}

impl Skill for PayloadExtractor {
    fn name(&self) -> &str {
        "extract_lsb_payload"
    }

    fn description(&self) -> &str {
        "Extracts a terminator-framed payload from the least-significant bits of a PNG."
    }

    fn schema(&self) -> Value {
        schema::skill_schema(
            self.name(),
            self.description(),
            json!({
                "path": schema::string_param("PNG file to read")
            }),
            vec!["path"],
        )
    }

    fn execute(&self, params: Value) -> SkillResult<SkillOutput> {
        let scan_params = ScanParams::from_value(&params)?;
        let path = scan_params.path();

        if !path.is_file() {
            return Err(SkillError::InvalidParams(format!(
                "Not a file: {}",
                path.display()
            )));
        }

        let bytes = fs::read(path)?;
        let (image, _) = decode_container(&bytes)?;
        let codec = self.controller.codec();

        let payload = match codec.extract(&image)? {
            Extraction::Found(payload) => ExtractedPayload::new(payload),
            Extraction::NotFound => return Ok(SkillOutput::empty()),
        };

        let finding = Finding {
            finding_type: "lsb_payload".to_string(),
            value: json!({
                "length": payload.bytes().len(),
                "sha256": payload.digest().sha256,
                "preview": payload.preview()
            }),
            confidence: 1.0,
            location: path.display().to_string(),
            severity: Severity::Medium,
            metadata: json!({
                "codec": codec.name(),
                "description": format!("{} byte payload recovered", payload.bytes().len())
            }),
        };

        Ok(SkillOutput::with_findings(vec![finding]))
    }

    fn categories(&self) -> Vec<&str> {
        vec!["steganography", "extraction"]
    }
}
