//! HTTP client wrapper for interacting with OpenSearch.

use crate::config::Config;
use crate::opensearch::mapping::HIGHLIGHT_MAX_ANALYZED_OFFSET;
use crate::opensearch::types::{GetDocumentResponse, IndexStatus, OpenSearchError};
use crate::retry::RetryPolicy;
use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde_json::{Value, json};


/// Lightweight HTTP client for OpenSearch operations on a single index.
pub struct OpenSearchService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) index: String,
    pub(crate) retry: RetryPolicy,
}

impl OpenSearchService {
    /// Construct a new client for the configured cluster and index.
    pub fn new(config: &Config) -> Result<Self, OpenSearchError> {
        let client = Client::builder()
            .user_agent("ndf-search/0.1")
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        let base_url =
            normalize_base_url(&config.opensearch_url).map_err(OpenSearchError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            index = %config.index_name,
            "Initialized OpenSearch HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            index: config.index_name.clone(),
            retry: RetryPolicy::default(),
        })
    }

    /// Name of the index this client targets.
    pub fn index_name(&self) -> &str {
        &self.index
    }

    /// Check that the cluster answers at all.
    pub async fn ping(&self) -> Result<(), OpenSearchError> {
        let response = self.request(Method::GET, "")?.send().await?;
        self.ensure_success(response, || {
            tracing::debug!("OpenSearch reachable");
        })
        .await
    }

    /// Create the index from `mapping` only when it is missing.
    pub async fn ensure_index(&self, mapping: &Value) -> Result<IndexStatus, OpenSearchError> {
        if self.index_exists().await? {
            tracing::debug!(index = %self.index, "Index already present");
            return Ok(IndexStatus::Existing);
        }

        tracing::info!(index = %self.index, "Creating index");
        let response = self
            .request(Method::PUT, &self.index)?
            .json(mapping)
            .send()
            .await?;
        self.ensure_success(response, || {
            tracing::info!(index = %self.index, "Index created");
        })
        .await?;
        Ok(IndexStatus::Created)
    }

    /// Upsert a document under `id`, retrying transient failures.
    pub async fn index_document<T>(&self, id: &str, document: &T) -> Result<(), OpenSearchError>
    where
        T: Serialize + ?Sized,
    {
        let url = &self.document_url(id)?;
        self.retry
            .run(
                "index_document",
                move || async move {
                    let response = self
                        .client
                        .request(Method::PUT, url.clone())
                        .json(document)
                        .send()
                        .await?;
                    self.ensure_success(response, || {
                        tracing::debug!(index = %self.index, id, "Document indexed");
                    })
                    .await
                },
                OpenSearchError::is_transient,
            )
            .await
    }

    /// Run a `_search` request and return the engine's response untouched.
    pub async fn search(&self, body: &Value) -> Result<Value, OpenSearchError> {
        let response = self
            .request(Method::POST, &format!("{}/_search", self.index))?
            .json(body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(self.unexpected(response, "Search request failed").await)
        }
    }

    /// Fetch the stored `_source` of a document.
    pub async fn get_document(&self, id: &str) -> Result<Value, OpenSearchError> {
        let url = self.document_url(id)?;
        let response = self.client.request(Method::GET, url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(OpenSearchError::NotFound(id.to_string())),
            status if status.is_success() => {
                let raw: Value = response.json().await?;
                match serde_json::from_value::<GetDocumentResponse>(raw.clone()) {
                    Ok(GetDocumentResponse {
                        found: Some(false), ..
                    }) => Err(OpenSearchError::NotFound(id.to_string())),
                    Ok(GetDocumentResponse {
                        source: Some(source),
                        ..
                    }) => Ok(source),
                    _ => Ok(raw),
                }
            }
            _ => Err(self.unexpected(response, "Document lookup failed").await),
        }
    }

    /// Apply the highlighter's analysis limit used at index creation, so indexes created
    /// elsewhere still produce fragments for long bodies.
    ///
    /// Best effort: failures are logged and reported as `false`.
    pub async fn raise_highlight_limit(&self) -> bool {
        let body = json!({ "index.highlight.max_analyzed_offset": HIGHLIGHT_MAX_ANALYZED_OFFSET });
        let request = match self.request(Method::PUT, &format!("{}/_settings", self.index)) {
            Ok(request) => request,
            Err(error) => {
                tracing::debug!(error = %error, "Skipping highlight settings update");
                return false;
            }
        };
        match request
            .timeout(std::time::Duration::from_secs(5))
            .json(&body)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!(status = %response.status(), "Highlight settings update rejected");
                false
            }
            Err(error) => {
                tracing::debug!(error = %error, "Highlight settings update failed");
                false
            }
        }
    }

    async fn index_exists(&self) -> Result<bool, OpenSearchError> {
        let response = self.request(Method::GET, &self.index)?.send().await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(self.unexpected(response, "Index existence check failed").await),
        }
    }

    fn request(
        &self,
        method: Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, OpenSearchError> {
        let url = format_endpoint(&self.base_url, path);
        Ok(self.client.request(method, url))
    }

    fn document_url(&self, id: &str) -> Result<Url, OpenSearchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| OpenSearchError::InvalidUrl(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| OpenSearchError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push(&self.index)
            .push("_doc")
            .push(id);
        Ok(url)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), OpenSearchError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            Err(self.unexpected(response, "OpenSearch request failed").await)
        }
    }

    async fn unexpected(&self, response: reqwest::Response, message: &str) -> OpenSearchError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = OpenSearchError::UnexpectedStatus { status, body };
        tracing::error!(index = %self.index, error = %error, "{message}");
        error
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
