//! Ingestion pipeline: folder scan, text extraction and index upserts.

pub mod record;
pub mod scan;
mod service;
pub mod watch;

use crate::opensearch::OpenSearchError;
use thiserror::Error;

pub use record::{DocumentRecord, ExtractionOutcome, build_record, document_id};
pub use scan::{ScanFilters, ScannedFile, derive_levels, scan_documents};
pub use service::{DocumentSink, IngestService, IngestSettings};

/// Per-file ingestion failures.
#[derive(Debug, Error)]
pub enum IngestError {
    /// File could not be read or inspected.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// Record could not be written to the index.
    #[error("Index write failed: {0}")]
    Index(#[from] OpenSearchError),
    /// File watcher could not be started.
    #[error("File watcher failed: {0}")]
    Watch(#[from] notify::Error),
}
