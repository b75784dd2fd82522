//! Ingestion service: scan, extract, and upsert records.

use super::IngestError;
use super::record::{DocumentRecord, ExtractionOutcome, build_record};
use super::scan::{ScanFilters, ScannedFile, derive_levels, scan_documents};
use crate::config::Config;
use crate::metrics::{IngestMetrics, IngestReport};
use crate::opensearch::{OpenSearchError, OpenSearchService};
use crate::tika::ExtractionClient;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Destination for document records.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Insert or replace the record stored under `id`.
    async fn upsert(&self, id: &str, record: &DocumentRecord) -> Result<(), OpenSearchError>;
}

#[async_trait]
impl DocumentSink for OpenSearchService {
    async fn upsert(&self, id: &str, record: &DocumentRecord) -> Result<(), OpenSearchError> {
        self.index_document(id, record).await
    }
}

/// Scan parameters derived from configuration.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Folder holding the `level1/level2/**` tree.
    pub root: PathBuf,
    /// Optional level allow-lists.
    pub filters: ScanFilters,
    /// Stop after this many documents (`0` = unlimited).
    pub max_docs: usize,
    /// Files above this size skip extraction.
    pub max_ocr_bytes: u64,
}

impl IngestSettings {
    /// Settings taken from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.doc_root.clone(),
            filters: ScanFilters {
                level1: config.filter_level1.clone(),
                level2: config.filter_level2.clone(),
            },
            max_docs: config.max_docs,
            max_ocr_bytes: config.max_ocr_bytes(),
        }
    }
}

/// Coordinates scanning, extraction and index writes.
pub struct IngestService {
    extractor: Box<dyn ExtractionClient>,
    sink: Box<dyn DocumentSink>,
    settings: IngestSettings,
    metrics: IngestMetrics,
}

impl IngestService {
    /// Build a service around an extraction backend and a record sink.
    pub fn new(
        extractor: Box<dyn ExtractionClient>,
        sink: Box<dyn DocumentSink>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            extractor,
            sink,
            settings,
            metrics: IngestMetrics::new(),
        }
    }

    /// Scan parameters in use.
    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Counters accumulated since the service was created.
    pub fn metrics_snapshot(&self) -> IngestReport {
        self.metrics.snapshot()
    }

    /// Index every document under the root once.
    ///
    /// Per-file failures are logged and counted; they never stop the scan.
    pub async fn run_initial(&self) -> IngestReport {
        let before = self.metrics.snapshot();
        let root = self.settings.root.clone();
        let filters = self.settings.filters.clone();
        let max_docs = self.settings.max_docs;
        let files = tokio::task::spawn_blocking(move || scan_documents(&root, &filters, max_docs))
            .await
            .unwrap_or_else(|error| {
                tracing::error!(error = %error, "Directory scan aborted");
                Vec::new()
            });
        tracing::info!(
            root = %self.settings.root.display(),
            files = files.len(),
            "Scan complete"
        );

        for file in &files {
            if self.index_file(file).await.is_ok() {
                let indexed = self.metrics.snapshot().since(&before).indexed;
                if indexed <= 10 || indexed % 50 == 0 {
                    tracing::info!(indexed, last = %file.file_name, "Indexing progress");
                }
            }
        }

        let report = self.metrics.snapshot().since(&before);
        tracing::info!(
            scanned = report.scanned,
            indexed = report.indexed,
            failed = report.failed,
            extraction_skipped = report.extraction_skipped,
            extraction_failed = report.extraction_failed,
            "Initial indexing finished"
        );
        report
    }

    /// Build and upsert the record of one scanned file.
    pub async fn index_file(&self, file: &ScannedFile) -> Result<ExtractionOutcome, IngestError> {
        self.metrics.record_scanned();
        let result = self.write_record(file).await;
        match &result {
            Ok(outcome) => self.metrics.record_indexed(*outcome),
            Err(error) => {
                self.metrics.record_failed();
                tracing::warn!(
                    path = %file.path.display(),
                    level1 = %file.level1,
                    level2 = %file.level2,
                    error = %error,
                    "Failed to index document"
                );
            }
        }
        result
    }

    async fn write_record(&self, file: &ScannedFile) -> Result<ExtractionOutcome, IngestError> {
        let (record, outcome) =
            build_record(file, self.extractor.as_ref(), self.settings.max_ocr_bytes).await?;
        self.sink.upsert(&record.id, &record).await?;
        tracing::debug!(path = %file.path.display(), id = %record.id, "Indexed document");
        Ok(outcome)
    }

    /// Index a single path reported by the watcher.
    ///
    /// Returns `None` when the path is not an indexable document under the root.
    pub async fn index_path(&self, path: &Path) -> Option<Result<ExtractionOutcome, IngestError>> {
        let file = derive_levels(&self.settings.root, path)?;
        let result = self.index_file(&file).await;
        if result.is_ok() {
            tracing::info!(path = %file.path.display(), "Indexed");
        }
        Some(result)
    }
}
