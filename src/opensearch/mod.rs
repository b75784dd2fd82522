//! OpenSearch integration: HTTP client, index mapping and query bodies.

pub mod client;
pub mod mapping;
pub mod query;
pub mod types;

pub use client::OpenSearchService;
pub use mapping::{default_mapping, load_mapping};
pub use query::{SearchParams, SortOrder, build_search_body, terms_filter};
pub use types::{IndexStatus, OpenSearchError};
