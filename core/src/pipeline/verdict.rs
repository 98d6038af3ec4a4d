//! Verdict records and the evidence trail

use crate::analysis::SuspicionScore;
use crate::bitmap::ContainerInfo;
use crate::reputation::{PayloadDigest, Reputation};
use crate::signature::SignatureMatch;
use serde::Serialize;
use std::time::Instant;

/// Characters of payload text kept in the serialized preview
const PREVIEW_CHARS: usize = 256;

/// Risk above which signature hits are treated as confirmed
pub const MALICIOUS_RISK: u32 = 50;

/// Overall outcome of a scan
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Clean,
    Suspicious,
    Malicious,
    Indeterminate,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Classification::Clean => "clean",
            Classification::Suspicious => "suspicious",
            Classification::Malicious => "malicious",
            Classification::Indeterminate => "indeterminate",
        };
        f.write_str(s)
    }
}

/// Pipeline states, in execution order
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    StaticScan,
    StegoSuspicion,
    PayloadExtraction,
    VerdictReported,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    /// Stage completed and handed over to the next one
    Passed,
    /// Stage rejected the input
    Rejected,
    /// A later stage was deliberately not run
    Withheld,
    Score,
    PayloadNotFound,
    PayloadExtracted,
    SignatureMatch,
    Reputation,
    /// A collaborator failed or timed out
    Degraded,
    Note,
}

/// One entry in the audit trail
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Evidence {
    pub stage: Stage,
    pub kind: EvidenceKind,
    pub detail: String,
}

/// Bytes recovered in Stage 3
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExtractedPayload {
    #[serde(skip)]
    bytes: Vec<u8>,
    digest: PayloadDigest,
    preview: String,
}

impl ExtractedPayload {
    pub fn new(bytes: Vec<u8>) -> Self {
        let digest = PayloadDigest::of(&bytes);
        let preview = String::from_utf8_lossy(&bytes)
            .chars()
            .take(PREVIEW_CHARS)
            .collect();
        Self {
            bytes,
            digest,
            preview,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn digest(&self) -> &PayloadDigest {
        &self.digest
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }
}

/// Final, immutable result of one scan
#[derive(Debug, Clone, Serialize)]
pub struct VerdictRecord {
    label: String,
    classification: Classification,
    /// Last stage that did work
    stage_reached: Stage,
    container: Option<ContainerInfo>,
    suspicion: Option<SuspicionScore>,
    payload: Option<ExtractedPayload>,
    matches: Vec<SignatureMatch>,
    reputation: Option<Reputation>,
    risk_score: u32,
    degraded: bool,
    evidence: Vec<Evidence>,
    elapsed_ms: u64,
}

impl VerdictRecord {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn stage_reached(&self) -> Stage {
        self.stage_reached
    }

    pub fn container(&self) -> Option<&ContainerInfo> {
        self.container.as_ref()
    }

    pub fn suspicion(&self) -> Option<&SuspicionScore> {
        self.suspicion.as_ref()
    }

    pub fn payload(&self) -> Option<&ExtractedPayload> {
        self.payload.as_ref()
    }

    pub fn matches(&self) -> &[SignatureMatch] {
        &self.matches
    }

    pub fn reputation(&self) -> Option<&Reputation> {
        self.reputation.as_ref()
    }

    pub fn risk_score(&self) -> u32 {
        self.risk_score
    }

    /// A collaborator was unavailable; confidence is reduced
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn evidence(&self) -> &[Evidence] {
        &self.evidence
    }

    pub fn evidence_for(&self, stage: Stage) -> impl Iterator<Item = &Evidence> {
        self.evidence.iter().filter(move |e| e.stage == stage)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }
}

/// Risk contributed by signature hits, capped at 100
pub fn risk_score(matches: &[SignatureMatch]) -> u32 {
    matches
        .iter()
        .map(|m| m.score)
        .fold(0u32, u32::saturating_add)
        .min(100)
}

/// Classification for a found payload from its signature risk
pub fn classify_risk(risk: u32) -> Classification {
    if risk > MALICIOUS_RISK {
        Classification::Malicious
    } else {
        Classification::Suspicious
    }
}

/// Per-scan state threaded through the stages.
///
/// Each scan owns its context; nothing is shared between scans.
#[derive(Debug)]
pub struct ScanContext {
    label: String,
    started: Instant,
    stage: Stage,
    container: Option<ContainerInfo>,
    suspicion: Option<SuspicionScore>,
    payload: Option<ExtractedPayload>,
    matches: Vec<SignatureMatch>,
    reputation: Option<Reputation>,
    risk_score: u32,
    degraded: bool,
    evidence: Vec<Evidence>,
}

impl ScanContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            started: Instant::now(),
            stage: Stage::StaticScan,
            container: None,
            suspicion: None,
            payload: None,
            matches: Vec::new(),
            reputation: None,
            risk_score: 0,
            degraded: false,
            evidence: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn enter(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub(crate) fn record(&mut self, kind: EvidenceKind, detail: impl Into<String>) {
        self.evidence.push(Evidence {
            stage: self.stage,
            kind,
            detail: detail.into(),
        });
    }

    pub(crate) fn degrade(&mut self, detail: impl Into<String>) {
        self.degraded = true;
        self.record(EvidenceKind::Degraded, detail);
    }

    pub(crate) fn set_container(&mut self, info: ContainerInfo) {
        self.container = Some(info);
    }

    pub(crate) fn set_suspicion(&mut self, score: SuspicionScore) {
        self.suspicion = Some(score);
    }

    pub(crate) fn set_payload(&mut self, payload: ExtractedPayload) {
        self.payload = Some(payload);
    }

    pub(crate) fn set_matches(&mut self, matches: Vec<SignatureMatch>) {
        self.risk_score = risk_score(&matches);
        self.matches = matches;
    }

    pub(crate) fn set_reputation(&mut self, reputation: Reputation) {
        self.reputation = Some(reputation);
    }

    /// Seal the trail into a verdict
    pub(crate) fn finish(mut self, classification: Classification) -> VerdictRecord {
        let reached = self.stage;
        self.stage = Stage::VerdictReported;
        self.record(
            EvidenceKind::Note,
            format!("verdict {} after {:?}", classification, reached),
        );

        VerdictRecord {
            label: self.label,
            classification,
            stage_reached: reached,
            container: self.container,
            suspicion: self.suspicion,
            payload: self.payload,
            matches: self.matches,
            reputation: self.reputation,
            risk_score: self.risk_score,
            degraded: self.degraded,
            evidence: self.evidence,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}
