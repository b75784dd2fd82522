//! Search service: read-only access to the document index.

use crate::config::Config;
use crate::opensearch::query::{build_filters_body, build_stats_body, build_suggest_body};
use crate::opensearch::{OpenSearchError, OpenSearchService, SearchParams, build_search_body};
use crate::search::stats::{IndexStats, parse_index_stats};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Errors emitted while serving search requests.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The search engine rejected or failed the request.
    #[error("Search engine request failed: {0}")]
    Engine(#[from] OpenSearchError),
}

/// Abstraction over the index used by the HTTP surface.
#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Run a filtered full-text search and return the engine response unmodified.
    async fn search(&self, params: SearchParams) -> Result<Value, SearchError>;

    /// Available level1/level2 values as engine aggregations.
    async fn filters(&self) -> Result<Value, SearchError>;

    /// Title suggestions for a prefix, as `{ id, ..source }` objects.
    async fn suggest(&self, prefix: &str) -> Result<Vec<Value>, SearchError>;

    /// Stored record of a single document.
    async fn document(&self, id: &str) -> Result<Value, SearchError>;

    /// Document counts per level as seen by the index.
    async fn index_stats(&self) -> Result<IndexStats, SearchError>;

    /// Folder that served files must live under.
    fn doc_root(&self) -> &Path;
}

/// [`SearchApi`] backed by OpenSearch.
pub struct SearchService {
    opensearch: OpenSearchService,
    doc_root: PathBuf,
    highlight_configured: AtomicBool,
}

impl SearchService {
    /// Build the service and verify that the search engine answers.
    pub async fn connect(config: &Config) -> Result<Self, SearchError> {
        let opensearch = OpenSearchService::new(config)?;
        opensearch.ping().await?;
        tracing::info!(index = %opensearch.index_name(), "Search engine reachable");
        Ok(Self::with_client(opensearch, config.doc_root.clone()))
    }

    /// Wrap an existing client without probing it.
    pub fn with_client(opensearch: OpenSearchService, doc_root: PathBuf) -> Self {
        Self {
            opensearch,
            doc_root,
            highlight_configured: AtomicBool::new(false),
        }
    }

    async fn ensure_highlight_settings(&self) {
        if self.highlight_configured.load(Ordering::Relaxed) {
            return;
        }
        if self.opensearch.raise_highlight_limit().await {
            self.highlight_configured.store(true, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl SearchApi for SearchService {
    async fn search(&self, params: SearchParams) -> Result<Value, SearchError> {
        self.ensure_highlight_settings().await;
        let body = build_search_body(&params);
        tracing::debug!(
            q = %params.q,
            level1 = ?params.level1,
            level2 = ?params.level2,
            from = params.from,
            size = params.size,
            "Search request"
        );
        Ok(self.opensearch.search(&body).await?)
    }

    async fn filters(&self) -> Result<Value, SearchError> {
        let response = self.opensearch.search(&build_filters_body()).await?;
        Ok(response
            .get("aggregations")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    async fn suggest(&self, prefix: &str) -> Result<Vec<Value>, SearchError> {
        let response = self.opensearch.search(&build_suggest_body(prefix)).await?;
        Ok(suggestions_from_hits(&response))
    }

    async fn document(&self, id: &str) -> Result<Value, SearchError> {
        Ok(self.opensearch.get_document(id).await?)
    }

    async fn index_stats(&self) -> Result<IndexStats, SearchError> {
        let response = self.opensearch.search(&build_stats_body()).await?;
        Ok(parse_index_stats(&response))
    }

    fn doc_root(&self) -> &Path {
        &self.doc_root
    }
}

/// Flatten `hits.hits[]` into `{ "id": _id, ..._source }` objects.
pub fn suggestions_from_hits(response: &Value) -> Vec<Value> {
    response["hits"]["hits"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .map(|hit| {
                    let mut entry = Map::new();
                    entry.insert("id".into(), hit["_id"].clone());
                    if let Some(source) = hit["_source"].as_object() {
                        for (key, value) in source {
                            entry.insert(key.clone(), value.clone());
                        }
                    }
                    Value::Object(entry)
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use httpmock::{Method::POST, Method::PUT, MockServer};
    use reqwest::Client;
    use serde_json::json;

    fn service_for(server: &MockServer) -> SearchService {
        SearchService::with_client(
            OpenSearchService {
                client: Client::builder()
                    .user_agent("ndf-search-test")
                    .build()
                    .expect("client"),
                base_url: server.base_url(),
                index: "ndf-docs".into(),
                retry: RetryPolicy::none(),
            },
            PathBuf::from("/data"),
        )
    }

    #[test]
    fn suggestions_merge_id_and_source() {
        let response = json!({
            "hits": { "hits": [
                { "_id": "a1", "_source": { "title": "Taxi", "level1": "2023" } },
                { "_id": "b2" }
            ] }
        });
        assert_eq!(
            suggestions_from_hits(&response),
            vec![
                json!({ "id": "a1", "title": "Taxi", "level1": "2023" }),
                json!({ "id": "b2" })
            ]
        );
        assert!(suggestions_from_hits(&json!({})).is_empty());
    }

    #[tokio::test]
    async fn search_sends_level_filters_and_passes_response_through() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/ndf-docs/_settings");
                then.status(200).json_body(json!({ "acknowledged": true }));
            })
            .await;
        let search = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/ndf-docs/_search")
                    .body_contains(r#"{"terms":{"level1":["2023"]}}"#)
                    .body_contains(r#"{"terms":{"level2":["Mars"]}}"#);
                then.status(200).json_body(json!({
                    "hits": { "total": { "value": 1 }, "hits": [{ "_id": "x" }] },
                    "custom": "kept"
                }));
            })
            .await;

        let response = service_for(&server)
            .search(SearchParams {
                q: "taxi".into(),
                level1: vec!["2023".into()],
                level2: vec!["Mars".into()],
                ..Default::default()
            })
            .await
            .expect("search");

        search.assert();
        assert_eq!(response["custom"], "kept");
        assert_eq!(response["hits"]["hits"][0]["_id"], "x");
    }

    #[tokio::test]
    async fn filters_return_aggregations_only() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/ndf-docs/_search");
                then.status(200).json_body(json!({
                    "hits": { "hits": [] },
                    "aggregations": { "by_level1": { "buckets": [] } }
                }));
            })
            .await;

        let filters = service_for(&server).filters().await.expect("filters");
        assert_eq!(filters, json!({ "by_level1": { "buckets": [] } }));
    }

    #[tokio::test]
    async fn engine_errors_keep_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/ndf-docs/_search");
                then.status(400).body("parsing_exception");
            })
            .await;

        let error = service_for(&server)
            .suggest("no")
            .await
            .expect_err("should fail");
        match error {
            SearchError::Engine(OpenSearchError::UnexpectedStatus { status, body }) => {
                assert_eq!(status.as_u16(), 400);
                assert_eq!(body, "parsing_exception");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
