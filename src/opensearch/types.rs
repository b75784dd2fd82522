//! Shared types used by the OpenSearch client and helpers.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors returned while interacting with OpenSearch.
#[derive(Debug, Error)]
pub enum OpenSearchError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid OpenSearch URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// OpenSearch responded with an unexpected status code.
    #[error("Unexpected OpenSearch response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from OpenSearch.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Requested document does not exist in the index.
    #[error("Document not found: {0}")]
    NotFound(String),
}

impl OpenSearchError {
    /// Whether another attempt could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::UnexpectedStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::InvalidUrl(_) | Self::NotFound(_) => false,
        }
    }
}

/// Outcome of [`crate::opensearch::OpenSearchService::ensure_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// The index was already present.
    Existing,
    /// The index was created from the mapping body.
    Created,
}

#[derive(Deserialize)]
pub(crate) struct GetDocumentResponse {
    #[serde(default)]
    pub(crate) found: Option<bool>,
    #[serde(rename = "_source", default)]
    pub(crate) source: Option<Value>,
}
