//! Batch scanning, cancellation and on-disk PNG inputs

mod common;

use common::*;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stegotriage_core::{
    encode_png, scan_path, BatchItem, BatchOutcome, BatchScanner, CancellationToken,
    Classification, EvidenceKind, ImageSource, PipelineController, RuleSet, ScanConfig,
    SignatureMatch, SignatureMatcher, Stage, StegoResult,
};

fn scanner() -> BatchScanner {
    BatchScanner::new(Arc::new(
        PipelineController::new(&ScanConfig::default()).unwrap(),
    ))
}

/// Cancels the batch the first time it is asked to match
struct CancellingMatcher {
    token: CancellationToken,
    calls: AtomicUsize,
    inner: RuleSet,
}

impl SignatureMatcher for CancellingMatcher {
    fn name(&self) -> &str {
        "cancelling_rules"
    }

    fn match_bytes(&self, payload: &[u8]) -> StegoResult<Vec<SignatureMatch>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
        self.inner.match_bytes(payload)
    }
}

#[test]
fn batch_preserves_input_order() {
    let items = vec![
        BatchItem::new("clean", ImageSource::Raw(random_image(256, 256, 3, 7))),
        BatchItem::new("shell", ImageSource::Raw(stego_image(REVERSE_SHELL))),
        BatchItem::new("garbage", ImageSource::Encoded(b"junk".to_vec())),
        BatchItem::new("notes", ImageSource::Raw(stego_image(MEETING_NOTES))),
    ];

    let outcomes = scanner().run(items);
    let summary: Vec<(&str, Classification)> = outcomes
        .iter()
        .map(|o| {
            let v = o.verdict().unwrap();
            (v.label(), v.classification())
        })
        .collect();

    assert_eq!(
        summary,
        vec![
            ("clean", Classification::Clean),
            ("shell", Classification::Malicious),
            ("garbage", Classification::Indeterminate),
            ("notes", Classification::Suspicious),
        ]
    );
}

#[test]
fn cancelled_batch_skips_everything() {
    let codec = Arc::new(CountingCodec::default());
    let controller = PipelineController::new(&ScanConfig::default())
        .unwrap()
        .with_codec(codec.clone());
    let token = CancellationToken::new();
    token.cancel();

    let scanner = BatchScanner::new(Arc::new(controller)).with_cancellation(token);
    let items = (0..6)
        .map(|i| {
            BatchItem::new(
                format!("item-{}", i),
                ImageSource::Raw(stego_image(REVERSE_SHELL)),
            )
        })
        .collect();

    let outcomes = scanner.run(items);
    assert_eq!(outcomes.len(), 6);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, BatchOutcome::Skipped { .. })));
    assert_eq!(codec.extracts(), 0);
}

#[test]
fn cancellation_stops_pending_scans_only() {
    let token = CancellationToken::new();
    let matcher = Arc::new(CancellingMatcher {
        token: token.clone(),
        calls: AtomicUsize::new(0),
        inner: RuleSet::default(),
    });
    let controller = PipelineController::new(&ScanConfig::default())
        .unwrap()
        .with_matcher(matcher.clone());
    let scanner = BatchScanner::new(Arc::new(controller)).with_cancellation(token);

    let items = (0..4)
        .map(|i| {
            BatchItem::new(
                format!("item-{}", i),
                ImageSource::Raw(stego_image(REVERSE_SHELL)),
            )
        })
        .collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap();
    let outcomes = pool.install(|| scanner.run(items));

    let completed: Vec<_> = outcomes.iter().filter_map(|o| o.verdict()).collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].classification(), Classification::Malicious);
    assert_eq!(outcomes.len(), 4);
    assert_eq!(matcher.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn directory_scan_reads_png_files() {
    let dir = tempfile::tempdir().unwrap();

    fs::write(
        dir.path().join("a_clean.png"),
        encode_png(&random_image(256, 256, 3, 7)).unwrap(),
    )
    .unwrap();
    fs::write(
        dir.path().join("b_stego.png"),
        encode_png(&stego_image(REVERSE_SHELL)).unwrap(),
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

    let nested = dir.path().join("nested");
    fs::create_dir(&nested).unwrap();
    fs::write(
        nested.join("c_notes.png"),
        encode_png(&stego_image(MEETING_NOTES)).unwrap(),
    )
    .unwrap();

    let verdicts = scan_path(dir.path(), false, &ScanConfig::default()).unwrap();
    let classes: Vec<_> = verdicts.iter().map(|v| v.classification()).collect();
    assert_eq!(
        classes,
        vec![Classification::Clean, Classification::Malicious]
    );
    assert!(verdicts[1].label().ends_with("b_stego.png"));

    let verdicts = scan_path(dir.path(), true, &ScanConfig::default()).unwrap();
    assert_eq!(verdicts.len(), 3);
    assert_eq!(verdicts[2].classification(), Classification::Suspicious);
}

#[test]
fn appended_trailer_is_noted_in_static_scan() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trailer.png");

    let mut png = encode_png(&random_image(64, 64, 4, 3)).unwrap();
    png.extend_from_slice(b"PK\x03\x04 appended archive");
    fs::write(&path, &png).unwrap();

    let verdicts = scan_path(&path, false, &ScanConfig::default()).unwrap();
    let verdict = &verdicts[0];

    assert_eq!(verdict.classification(), Classification::Clean);
    assert_eq!(verdict.container().unwrap().trailing_bytes, 21);
    assert!(verdict
        .evidence_for(Stage::StaticScan)
        .any(|e| e.kind == EvidenceKind::Note && e.detail.contains("after PNG end marker")));
}

#[test]
fn missing_file_is_indeterminate() {
    let dir = tempfile::tempdir().unwrap();
    let controller = PipelineController::new(&ScanConfig::default()).unwrap();

    let verdict = controller.scan(ImageSource::File(dir.path().join("gone.png")));
    assert_eq!(verdict.classification(), Classification::Indeterminate);
    assert_eq!(verdict.stage_reached(), Stage::StaticScan);
}
