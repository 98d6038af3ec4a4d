//! Parallel scanning of independent images

use super::verdict::{ScanContext, VerdictRecord};
use super::PipelineController;
use crate::bitmap::ImageSource;
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;
use walkdir::WalkDir;

/// Shared flag that stops not-yet-started scans
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One image queued for scanning
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub label: String,
    pub source: ImageSource,
}

impl BatchItem {
    pub fn new(label: impl Into<String>, source: ImageSource) -> Self {
        Self {
            label: label.into(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Completed(VerdictRecord),
    /// Cancelled before the scan started
    Skipped { label: String },
}

impl BatchOutcome {
    pub fn verdict(&self) -> Option<&VerdictRecord> {
        match self {
            BatchOutcome::Completed(verdict) => Some(verdict),
            BatchOutcome::Skipped { .. } => None,
        }
    }
}

/// Runs full pipeline scans across the rayon pool
pub struct BatchScanner {
    controller: Arc<PipelineController>,
    cancel: CancellationToken,
}

impl BatchScanner {
    pub fn new(controller: Arc<PipelineController>) -> Self {
        Self {
            controller,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Scan every item; outcomes come back in input order
    pub fn run(&self, items: Vec<BatchItem>) -> Vec<BatchOutcome> {
        let total = items.len();
        let collector = Mutex::new(Vec::with_capacity(total));

        items
            .into_par_iter()
            .enumerate()
            .for_each(|(index, item)| {
                let outcome = if self.cancel.is_cancelled() {
                    BatchOutcome::Skipped { label: item.label }
                } else {
                    BatchOutcome::Completed(
                        self.controller
                            .scan_with_context(ScanContext::new(item.label), item.source),
                    )
                };
                collector
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((index, outcome));
            });

        let mut outcomes = collector
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        outcomes.sort_by_key(|(index, _)| *index);

        let skipped = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, BatchOutcome::Skipped { .. }))
            .count();
        if skipped > 0 {
            info!(total, skipped, "batch cancelled before completion");
        }

        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// Scan every PNG under `path`
    pub fn scan_directory(&self, path: &Path, recursive: bool) -> Vec<BatchOutcome> {
        self.run(png_files(path, recursive))
    }
}

/// Collect `.png` files as batch items, sorted by path
pub fn png_files(path: &Path, recursive: bool) -> Vec<BatchItem> {
    let walker = if recursive {
        WalkDir::new(path)
    } else {
        WalkDir::new(path).max_depth(1)
    };

    let mut files: Vec<_> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();

    files
        .into_iter()
        .map(|p| BatchItem::new(p.display().to_string(), ImageSource::File(p)))
        .collect()
}
