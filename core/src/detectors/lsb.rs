//! LSB Steganography Detector
//!
//! Runs the gated pipeline over a PNG file or a directory of PNGs:
//! - Stage 1 container validation and appended-data notes
//! - Stage 2 run-length suspicion scoring
//! - Stage 3 extraction and signature matching, only when suspicious

use crate::bitmap::ImageSource;
use crate::pipeline::{
    BatchOutcome, BatchScanner, Classification, PipelineController, ScanContext, VerdictRecord,
};
use crate::skills::{
    schema, Finding, ScanParams, Severity, Skill, SkillError, SkillOutput, SkillResult,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub struct LsbDetector {
    controller: Arc<PipelineController>,
}

impl LsbDetector {
    pub fn new(controller: Arc<PipelineController>) -> Self {
        Self { controller }
    }

    /// Convert a verdict into a finding; clean verdicts only on request
    fn finding_for(&self, verdict: &VerdictRecord, include_clean: bool) -> Option<Finding> {
        let (finding_type, severity, confidence) = match verdict.classification() {
            Classification::Malicious if verdict.is_degraded() => {
                ("lsb_malicious_payload", Severity::Critical, 0.8)
            }
            Classification::Malicious => ("lsb_malicious_payload", Severity::Critical, 0.95),
            Classification::Suspicious => ("lsb_hidden_payload", Severity::High, 0.8),
            Classification::Indeterminate => ("scan_indeterminate", Severity::Low, 0.6),
            Classification::Clean if include_clean => ("lsb_clean", Severity::Info, 1.0),
            Classification::Clean => return None,
        };

        let description = verdict
            .evidence()
            .iter()
            .rev()
            .nth(1)
            .map(|e| e.detail.clone())
            .unwrap_or_default();

        Some(Finding {
            finding_type: finding_type.to_string(),
            value: json!({
                "classification": verdict.classification(),
                "stage": verdict.stage_reached(),
                "risk_score": verdict.risk_score(),
                "deviation": verdict.suspicion().map(|s| s.deviation),
                "rules": verdict.matches().iter().map(|m| m.rule.as_str()).collect::<Vec<_>>(),
                "sha256": verdict.payload().map(|p| p.digest().sha256.clone()),
            }),
            confidence,
            location: verdict.label().to_string(),
            severity,
            metadata: json!({
                "pattern": "LSB steganography",
                "description": description,
                "degraded": verdict.is_degraded()
            }),
        })
    }
}

impl Skill for LsbDetector {
    fn name(&self) -> &str {
        "detect_lsb_steganography"
    }

    fn description(&self) -> &str {
        "Triage PNG images for payloads hidden in the least-significant bits: \
         cheap run-length screening first, extraction and signature matching \
         only for suspicious images."
    }

    fn schema(&self) -> Value {
        schema::skill_schema(
            self.name(),
            self.description(),
            json!({
                "path": schema::string_param("PNG file or directory to scan"),
                "recursive": schema::bool_param("Scan directories recursively", false),
                "include_clean": schema::bool_param("Report clean images too", false)
            }),
            vec!["path"],
        )
    }

    fn execute(&self, params: Value) -> SkillResult<SkillOutput> {
        let scan_params = ScanParams::from_value(&params)?;
        let path = scan_params.path();

        if !path.exists() {
            return Err(SkillError::InvalidParams(format!(
                "Path does not exist: {}",
                path.display()
            )));
        }

        let outcomes = if path.is_file() {
            let ctx = ScanContext::new(path.display().to_string());
            vec![BatchOutcome::Completed(
                self.controller
                    .scan_with_context(ctx, ImageSource::File(path.to_path_buf())),
            )]
        } else {
            BatchScanner::new(Arc::clone(&self.controller))
                .scan_directory(path, scan_params.recursive)
        };

        let verdicts: Vec<&VerdictRecord> = outcomes.iter().filter_map(|o| o.verdict()).collect();
        let degraded = verdicts.iter().filter(|v| v.is_degraded()).count();

        let threshold = self.confidence_threshold();
        let findings: Vec<Finding> = verdicts
            .iter()
            .filter_map(|v| self.finding_for(v, scan_params.include_clean))
            .filter(|f| f.confidence >= threshold)
            .collect();

        let mut output = SkillOutput::with_findings(findings).with_metadata(json!({
            "scanned": verdicts.len(),
            "degraded": degraded
        }));
        output.complete = verdicts.len() == outcomes.len() && degraded == 0;
        Ok(output)
    }

    fn confidence_threshold(&self) -> f32 {
        0.5
    }

    fn categories(&self) -> Vec<&str> {
        vec!["steganography", "hidden_data", "image"]
    }
}
