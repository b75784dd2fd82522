#![deny(missing_docs)]

//! Core library for the expense-report document search: ingestion into OpenSearch and the
//! read-only search API.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Safe access to original files under the document root.
pub mod files;
/// Folder scan, text extraction and index upserts.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion counters.
pub mod metrics;
/// OpenSearch client, mapping and query builders.
pub mod opensearch;
/// Retry with exponential backoff for external calls.
pub mod retry;
/// Search service behind the HTTP surface.
pub mod search;
/// Apache Tika text extraction client.
pub mod tika;
