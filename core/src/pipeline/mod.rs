//! Gated three-stage detection pipeline
//!
//! ```text
//! StaticScan ──fail──────────────────────────────► Indeterminate
//!     │ ok
//! StegoSuspicion ──Low───────────────────────────► Clean
//!     │ Medium/High
//! PayloadExtraction ──NotFound───────────────────► Clean
//!     │ found
//!     └─ signatures (+ reputation) ──────────────► Suspicious / Malicious
//! ```
//!
//! Stage 3 is the only expensive, collaborator-dependent stage and never runs
//! when Stage 2 reports Low. Every stage-local failure is folded into the
//! verdict; [`PipelineController::scan`] always returns a [`VerdictRecord`].

mod batch;
mod guard;
mod static_scan;
mod verdict;

pub use batch::{png_files, BatchItem, BatchOutcome, BatchScanner, CancellationToken};
pub use guard::CallGuard;
pub use verdict::{
    classify_risk, risk_score, Classification, Evidence, EvidenceKind, ExtractedPayload,
    ScanContext, Stage, VerdictRecord, MALICIOUS_RISK,
};

use crate::analysis::{RunLengthAnalyzer, SuspicionLevel};
use crate::bitmap::ImageSource;
use crate::codec::{Codec, Extraction};
use crate::config::ScanConfig;
use crate::error::StegoResult;
use crate::reputation::{HashListReputation, PayloadDigest, ReputationService};
use crate::signature::{RuleSet, SignatureMatcher};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Orchestrates one scan per call; holds no per-scan state
pub struct PipelineController {
    codec: Arc<dyn Codec>,
    analyzer: RunLengthAnalyzer,
    matcher: Arc<dyn SignatureMatcher>,
    reputation: Option<Arc<dyn ReputationService>>,
    signature_guard: CallGuard,
    reputation_guard: CallGuard,
}

impl PipelineController {
    /// Build a controller from configuration with the built-in collaborators
    pub fn new(config: &ScanConfig) -> StegoResult<Self> {
        config.validate()?;

        let matcher: Arc<dyn SignatureMatcher> = match &config.rules {
            Some(path) => Arc::new(RuleSet::from_file(path)?),
            None => Arc::new(RuleSet::default()),
        };
        let reputation: Option<Arc<dyn ReputationService>> = match &config.known_bad_hashes {
            Some(path) => Some(Arc::new(HashListReputation::from_file(path)?)),
            None => None,
        };

        Ok(Self {
            codec: config.build_codec()?,
            analyzer: RunLengthAnalyzer::new(config.analyzer.clone())?,
            matcher,
            reputation,
            signature_guard: CallGuard::new(
                "signature",
                config.collaborator_workers,
                config.signature_timeout(),
            ),
            reputation_guard: CallGuard::new(
                "reputation",
                config.collaborator_workers,
                config.reputation_timeout(),
            ),
        })
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn SignatureMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_reputation(mut self, reputation: Arc<dyn ReputationService>) -> Self {
        self.reputation = Some(reputation);
        self
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub fn analyzer(&self) -> &RunLengthAnalyzer {
        &self.analyzer
    }

    /// Collaborator worker threads alive right now, across both guards
    pub fn live_workers(&self) -> usize {
        self.signature_guard.live_workers() + self.reputation_guard.live_workers()
    }

    pub fn scan(&self, source: ImageSource) -> VerdictRecord {
        self.scan_with_context(ScanContext::new("<memory>"), source)
    }

    /// Run the gated pipeline for one image
    pub fn scan_with_context(&self, mut ctx: ScanContext, source: ImageSource) -> VerdictRecord {
        // Stage 1
        let image = match static_scan::inspect(source, &mut ctx) {
            Ok(image) => image,
            Err(e) => {
                warn!(label = ctx.label(), error = %e, "static scan rejected input");
                ctx.record(EvidenceKind::Rejected, e.to_string());
                return self.report(ctx, Classification::Indeterminate);
            }
        };

        // Stage 2
        ctx.enter(Stage::StegoSuspicion);
        let score = self.analyzer.score(&image);
        let level = score.level;
        ctx.record(
            EvidenceKind::Score,
            format!(
                "{} suspicion, deviation {:.2} over {} windows (mean run length {:.3})",
                level, score.deviation, score.windows, score.mean_run_length
            ),
        );
        ctx.set_suspicion(score);

        if level == SuspicionLevel::Low {
            ctx.record(
                EvidenceKind::Withheld,
                "LSB plane consistent with noise; extraction not attempted",
            );
            return self.report(ctx, Classification::Clean);
        }

        // Stage 3
        ctx.enter(Stage::PayloadExtraction);
        let payload = match self.codec.extract(&image) {
            Ok(Extraction::Found(bytes)) => bytes,
            Ok(Extraction::NotFound) => {
                ctx.record(
                    EvidenceKind::PayloadNotFound,
                    format!("{} found no terminated payload", self.codec.name()),
                );
                return self.report(ctx, Classification::Clean);
            }
            Err(e) => {
                ctx.degrade(format!("{} failed: {}", self.codec.name(), e));
                return self.report(ctx, Classification::Indeterminate);
            }
        };

        let digest = PayloadDigest::of(&payload);
        ctx.record(
            EvidenceKind::PayloadExtracted,
            format!("{} bytes, sha256 {}", digest.len, digest.sha256),
        );

        let signature_verdict = self.match_signatures(&mut ctx, &payload);
        let reputation_malicious = self.consult_reputation(&mut ctx, digest);
        ctx.set_payload(ExtractedPayload::new(payload));

        let classification = if reputation_malicious {
            Classification::Malicious
        } else {
            signature_verdict
        };
        self.report(ctx, classification)
    }

    /// Indeterminate when the matcher cannot answer in time or is busy
    fn match_signatures(&self, ctx: &mut ScanContext, payload: &[u8]) -> Classification {
        let matcher = Arc::clone(&self.matcher);
        let service = matcher.name().to_string();
        let bytes = payload.to_vec();

        match self
            .signature_guard
            .call(&service, move || matcher.match_bytes(&bytes))
        {
            Ok(matches) => {
                for m in &matches {
                    ctx.record(
                        EvidenceKind::SignatureMatch,
                        format!("{} (score {}): {}", m.rule, m.score, m.hits.join(", ")),
                    );
                }
                if matches.is_empty() {
                    ctx.record(
                        EvidenceKind::Note,
                        "hidden payload present but no signature matched",
                    );
                }
                let risk = risk_score(&matches);
                ctx.set_matches(matches);
                classify_risk(risk)
            }
            Err(e) => {
                warn!(label = ctx.label(), error = %e, "signature matching degraded");
                ctx.degrade(e.to_string());
                Classification::Indeterminate
            }
        }
    }

    /// True when the reputation source confirms the payload as malicious
    fn consult_reputation(&self, ctx: &mut ScanContext, digest: PayloadDigest) -> bool {
        let Some(service) = self.reputation.as_ref().map(Arc::clone) else {
            return false;
        };
        let name = service.name().to_string();

        match self
            .reputation_guard
            .call(&name, move || service.lookup(&digest))
        {
            Ok(reputation) => {
                let malicious = reputation.is_malicious();
                ctx.record(EvidenceKind::Reputation, format!("{}: {:?}", name, reputation));
                ctx.set_reputation(reputation);
                malicious
            }
            Err(e) => {
                warn!(label = ctx.label(), error = %e, "reputation lookup degraded");
                ctx.degrade(e.to_string());
                false
            }
        }
    }

    fn report(&self, ctx: ScanContext, classification: Classification) -> VerdictRecord {
        let verdict = ctx.finish(classification);
        info!(
            label = verdict.label(),
            classification = %verdict.classification(),
            stage = ?verdict.stage_reached(),
            degraded = verdict.is_degraded(),
            "scan complete"
        );
        debug!(evidence = verdict.evidence().len(), "evidence recorded");
        verdict
    }
}
