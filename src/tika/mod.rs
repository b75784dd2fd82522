//! Text extraction through an Apache Tika server.
//!
//! Each document is sent twice: once to `PUT /meta` for its metadata (title, content type) and
//! once to `PUT /tika` for the plain-text body. Both calls share the transient-failure retry
//! policy.

use crate::config::Config;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, header::ACCEPT};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const META_TIMEOUT: Duration = Duration::from_secs(120);
const TEXT_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors raised while extracting text from a document.
#[derive(Debug, Error)]
pub enum TikaError {
    /// Source file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed to load.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Tika responded with an unexpected status code.
    #[error("Unexpected Tika response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Tika.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

impl TikaError {
    /// Whether another attempt could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::UnexpectedStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Io { .. } => false,
        }
    }
}

/// Text and metadata extracted from a single document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Document title, falling back to the file stem.
    pub title: String,
    /// Plain-text body.
    pub content: String,
    /// Detected MIME type, empty when unknown.
    pub media_type: String,
}

/// Interface implemented by text extraction backends.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Extract the text body and metadata of the file at `path`.
    async fn extract(&self, path: &Path) -> Result<Extraction, TikaError>;
}

/// HTTP client for a Tika server.
pub struct TikaClient {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    pub(crate) retry: RetryPolicy,
}

impl TikaClient {
    /// Construct a client for the configured Tika server.
    pub fn new(config: &Config) -> Result<Self, TikaError> {
        let http = Client::builder().user_agent("ndf-search/0.1").build()?;
        let base_url = config.tika_url.trim_end_matches('/').to_string();
        tracing::debug!(url = %base_url, "Initialized Tika HTTP client");
        Ok(Self {
            http,
            base_url,
            retry: RetryPolicy::default(),
        })
    }

    /// Check that the Tika server answers.
    pub async fn probe(&self) -> Result<(), TikaError> {
        let response = self
            .http
            .get(format!("{}/tika", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await?;
        ensure_success(response).await.map(|_| ())
    }

    async fn put_document(
        &self,
        endpoint: &str,
        accept: &'static str,
        bytes: &[u8],
        timeout: Duration,
    ) -> Result<String, TikaError> {
        let url = format!("{}/{endpoint}", self.base_url);
        self.retry
            .run(
                endpoint,
                || {
                    let request = self
                        .http
                        .request(Method::PUT, &url)
                        .header(ACCEPT, accept)
                        .timeout(timeout)
                        .body(bytes.to_vec());
                    async move { ensure_success(request.send().await?).await }
                },
                TikaError::is_transient,
            )
            .await
    }
}

#[async_trait]
impl ExtractionClient for TikaClient {
    async fn extract(&self, path: &Path) -> Result<Extraction, TikaError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| TikaError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let raw_meta = self
            .put_document("meta", "application/json", &bytes, META_TIMEOUT)
            .await?;
        let metadata = match serde_json::from_str::<Value>(&raw_meta) {
            Ok(Value::Object(map)) => map,
            _ => {
                tracing::debug!(path = %path.display(), "Tika metadata was not a JSON object");
                Map::new()
            }
        };

        let content = self
            .put_document("tika", "text/plain", &bytes, TEXT_TIMEOUT)
            .await?;

        Ok(Extraction {
            title: metadata_title(&metadata).unwrap_or_else(|| file_stem(path)),
            content,
            media_type: metadata_media_type(&metadata).unwrap_or_default(),
        })
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<String, TikaError> {
    let status = response.status();
    if status.is_success() {
        Ok(response.text().await?)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(TikaError::UnexpectedStatus { status, body })
    }
}

/// First non-empty string stored under `key`; Tika reports repeated keys as arrays.
fn metadata_string(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    let found = match metadata.get(key)? {
        Value::Array(values) => values
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|value| !value.is_empty()),
        other => other.as_str().map(str::trim).filter(|value| !value.is_empty()),
    };
    found.map(str::to_string)
}

fn metadata_title(metadata: &Map<String, Value>) -> Option<String> {
    metadata_string(metadata, "title").or_else(|| metadata_string(metadata, "dc:title"))
}

fn metadata_media_type(metadata: &Map<String, Value>) -> Option<String> {
    metadata_string(metadata, "Content-Type")
        .or_else(|| metadata_string(metadata, "Content-Type-Parsed"))
}

/// File name without its extension.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, PUT},
        MockServer,
    };
    use serde_json::json;
    use std::io::Write;

    fn client_for(server: &MockServer) -> TikaClient {
        TikaClient {
            http: Client::builder()
                .user_agent("ndf-search-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            retry: RetryPolicy {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
        }
    }

    fn sample_file(name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(b"%PDF-1.4 sample").expect("write");
        (dir, path)
    }

    #[tokio::test]
    async fn extract_combines_metadata_and_text() {
        let server = MockServer::start_async().await;
        let meta = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/meta")
                    .header("accept", "application/json")
                    .body("%PDF-1.4 sample");
                then.status(200).json_body(json!({
                    "dc:title": "  Note de frais mars  ",
                    "Content-Type": "application/pdf"
                }));
            })
            .await;
        let text = server
            .mock_async(|when, then| {
                when.method(PUT).path("/tika").header("accept", "text/plain");
                then.status(200).body("Taxi 42 EUR");
            })
            .await;

        let (_dir, path) = sample_file("facture.pdf");
        let extraction = client_for(&server).extract(&path).await.expect("extract");

        meta.assert();
        text.assert();
        assert_eq!(
            extraction,
            Extraction {
                title: "Note de frais mars".into(),
                content: "Taxi 42 EUR".into(),
                media_type: "application/pdf".into(),
            }
        );
    }

    #[tokio::test]
    async fn extract_falls_back_to_file_stem_without_metadata() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/meta");
                then.status(200).body("not json");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/tika");
                then.status(200).body("");
            })
            .await;

        let (_dir, path) = sample_file("releve.xlsx");
        let extraction = client_for(&server).extract(&path).await.expect("extract");

        assert_eq!(extraction.title, "releve");
        assert_eq!(extraction.media_type, "");
        assert_eq!(extraction.content, "");
    }

    #[tokio::test]
    async fn extract_retries_then_reports_server_errors() {
        let server = MockServer::start_async().await;
        let meta = server
            .mock_async(|when, then| {
                when.method(PUT).path("/meta");
                then.status(500).body("parser crashed");
            })
            .await;

        let (_dir, path) = sample_file("broken.doc");
        let error = client_for(&server)
            .extract(&path)
            .await
            .expect_err("should fail");

        meta.assert_hits(2);
        assert!(matches!(error, TikaError::UnexpectedStatus { .. }));
    }

    #[tokio::test]
    async fn extract_reports_missing_file() {
        let server = MockServer::start_async().await;
        let error = client_for(&server)
            .extract(Path::new("/no/such/file.pdf"))
            .await
            .expect_err("should fail");
        assert!(matches!(error, TikaError::Io { .. }));
        assert!(!error.is_transient());
    }

    #[tokio::test]
    async fn probe_hits_tika_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/tika");
                then.status(200).body("This is Tika Server.");
            })
            .await;

        client_for(&server).probe().await.expect("probe");
        mock.assert();
    }

    #[test]
    fn metadata_title_accepts_arrays_and_skips_blanks() {
        let metadata = json!({ "title": ["", "Budget"], "dc:title": "ignored" });
        let map = metadata.as_object().expect("object");
        assert_eq!(metadata_title(map).as_deref(), Some("Budget"));

        let blank = json!({ "title": "   ", "dc:title": "Rapport" });
        assert_eq!(
            metadata_title(blank.as_object().expect("object")).as_deref(),
            Some("Rapport")
        );
    }
}
