//! Read-only search over the document index.

mod service;
pub mod stats;

pub use service::{SearchApi, SearchError, SearchService, suggestions_from_hits};
pub use stats::{DiskStats, IndexStats, StatsReport, scan_disk_stats};
