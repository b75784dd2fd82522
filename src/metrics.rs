use std::sync::atomic::{AtomicU64, Ordering};

use crate::ingest::ExtractionOutcome;

/// Thread-safe counters describing ingestion activity.
#[derive(Default)]
pub struct IngestMetrics {
    scanned: AtomicU64,
    indexed: AtomicU64,
    failed: AtomicU64,
    extraction_skipped: AtomicU64,
    extraction_failed: AtomicU64,
}

impl IngestMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file picked up by the scanner or the watcher.
    pub fn record_scanned(&self) {
        self.scanned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successfully written record and how its extraction went.
    pub fn record_indexed(&self, outcome: ExtractionOutcome) {
        self.indexed.fetch_add(1, Ordering::Relaxed);
        match outcome {
            ExtractionOutcome::Extracted => {}
            ExtractionOutcome::SkippedTooLarge => {
                self.extraction_skipped.fetch_add(1, Ordering::Relaxed);
            }
            ExtractionOutcome::Failed => {
                self.extraction_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record a file that could not be written to the index.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> IngestReport {
        IngestReport {
            scanned: self.scanned.load(Ordering::Relaxed),
            indexed: self.indexed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            extraction_skipped: self.extraction_skipped.load(Ordering::Relaxed),
            extraction_failed: self.extraction_failed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct IngestReport {
    /// Files considered for indexing.
    pub scanned: u64,
    /// Records written to the index.
    pub indexed: u64,
    /// Files that could not be written.
    pub failed: u64,
    /// Records written without content because the file was too large.
    pub extraction_skipped: u64,
    /// Records written without content because extraction failed.
    pub extraction_failed: u64,
}

impl IngestReport {
    /// Counters accumulated since `earlier`.
    pub fn since(&self, earlier: &IngestReport) -> IngestReport {
        IngestReport {
            scanned: self.scanned - earlier.scanned,
            indexed: self.indexed - earlier.indexed,
            failed: self.failed - earlier.failed,
            extraction_skipped: self.extraction_skipped - earlier.extraction_skipped,
            extraction_failed: self.extraction_failed - earlier.extraction_failed,
        }
    }
}
