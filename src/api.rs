//! HTTP surface for the document search.
//!
//! The router is generic over [`SearchApi`] so tests can swap the search engine for a stub:
//!
//! - `GET /api/health` – Liveness probe.
//! - `GET /api/search` – Full-text query with `level1`/`level2` filters; the engine response is
//!   returned unmodified.
//! - `GET /api/filters` – Level aggregations for building filter pickers.
//! - `GET /api/suggest` – Search-as-you-type title suggestions.
//! - `GET /api/document/:id` – Stored record of a single document.
//! - `GET /api/file`, `GET /api/file/inline` – Original file bytes, restricted to `DOC_ROOT`.
//! - `GET /api/viewer` – Redirect to a hosted PDF.js viewer.
//! - `GET /api/stats` – Disk versus index document counts.

use crate::files::{FileAccessError, mime_type_for, resolve_under_root};
use crate::opensearch::{OpenSearchError, SearchParams, SortOrder};
use crate::search::{SearchApi, SearchError, StatsReport, scan_disk_stats};
use axum::{
    Json, Router,
    body::Body,
    extract::{Path as RoutePath, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use futures_util::{Stream, stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

const PDF_VIEWER_URL: &str = "https://cdn.jsdelivr.net/npm/pdfjs-dist@4.6.82/web/viewer.html";
const FILE_CHUNK_SIZE: usize = 8 * 1024;

/// Build the HTTP router exposing the search API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: SearchApi + 'static,
{
    Router::new()
        .route("/api/health", get(health))
        .route("/api/search", get(search::<S>))
        .route("/api/filters", get(filters::<S>))
        .route("/api/suggest", get(suggest::<S>))
        .route("/api/document/:id", get(document::<S>))
        .route("/api/file", get(download_file::<S>))
        .route("/api/file/inline", get(inline_file::<S>))
        .route("/api/viewer", get(viewer))
        .route("/api/stats", get(stats::<S>))
        .with_state(service)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Run a filtered search.
///
/// `level1` and `level2` may be repeated or carry comma-separated values; values of one
/// dimension are OR-ed, the two dimensions are AND-ed.
async fn search<S>(
    State(service): State<Arc<S>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError>
where
    S: SearchApi,
{
    let params = search_params(pairs)?;
    let response = service.search(params).await?;
    Ok(Json(response))
}

fn search_params(pairs: Vec<(String, String)>) -> Result<SearchParams, AppError> {
    let mut params = SearchParams::default();
    let mut sort = None;
    for (key, value) in pairs {
        match key.as_str() {
            "q" => params.q = value,
            "level1" => params.level1.push(value),
            "level2" => params.level2.push(value),
            "from" => params.from = parse_count("from", &value)?,
            "size" => params.size = parse_count("size", &value)?,
            "sort" => sort = Some(value),
            _ => {}
        }
    }
    params.sort = SortOrder::parse(sort.as_deref());
    Ok(params)
}

fn parse_count(name: &str, raw: &str) -> Result<usize, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid `{name}` value: {raw}")))
}

async fn filters<S>(State(service): State<Arc<S>>) -> Result<Json<Value>, AppError>
where
    S: SearchApi,
{
    Ok(Json(service.filters().await?))
}

#[derive(Deserialize)]
struct SuggestQuery {
    #[serde(default)]
    q: String,
}

async fn suggest<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<SuggestQuery>,
) -> Result<Json<Vec<Value>>, AppError>
where
    S: SearchApi,
{
    if query.q.trim().is_empty() {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(service.suggest(&query.q).await?))
}

async fn document<S>(
    State(service): State<Arc<S>>,
    RoutePath(id): RoutePath<String>,
) -> Result<Json<Value>, AppError>
where
    S: SearchApi,
{
    Ok(Json(service.document(&id).await?))
}

#[derive(Deserialize)]
struct FileQuery {
    path: String,
}

async fn download_file<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<FileQuery>,
) -> Result<Response, AppError>
where
    S: SearchApi,
{
    serve_file(service.doc_root(), &query.path, Disposition::Attachment).await
}

async fn inline_file<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<FileQuery>,
) -> Result<Response, AppError>
where
    S: SearchApi,
{
    serve_file(service.doc_root(), &query.path, Disposition::Inline).await
}

#[derive(Clone, Copy)]
enum Disposition {
    Attachment,
    Inline,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Self::Attachment => "attachment",
            Self::Inline => "inline",
        }
    }
}

/// Stream a document from disk. Relative paths are taken relative to the document root.
async fn serve_file(
    doc_root: &Path,
    requested: &str,
    disposition: Disposition,
) -> Result<Response, AppError> {
    let path = resolve_under_root(doc_root, Path::new(requested))?;
    let file = tokio::fs::File::open(&path).await.map_err(|err| {
        tracing::warn!(path = %path.display(), error = %err, "Failed to open file");
        AppError::File(FileAccessError::NotFound)
    })?;
    let length = file
        .metadata()
        .await
        .map(|metadata| metadata.len())
        .map_err(|err| AppError::Internal(format!("Failed to stat file: {err}")))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().replace('"', "'"))
        .unwrap_or_default();
    let content_disposition = format!("{}; filename=\"{file_name}\"", disposition.as_str());
    let content_disposition = HeaderValue::from_bytes(content_disposition.as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static(disposition.as_str()));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(mime_type_for(&path))),
            (header::CONTENT_DISPOSITION, content_disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(length)),
        ],
        Body::from_stream(file_chunks(file)),
    )
        .into_response())
}

/// Read `file` in fixed-size chunks; the stream ends after the first read error.
fn file_chunks(file: tokio::fs::File) -> impl Stream<Item = std::io::Result<Vec<u8>>> {
    stream::unfold(Some(file), |state| async move {
        let mut file = state?;
        let mut chunk = vec![0u8; FILE_CHUNK_SIZE];
        match file.read(&mut chunk).await {
            Ok(0) => None,
            Ok(read) => {
                chunk.truncate(read);
                Some((Ok(chunk), Some(file)))
            }
            Err(err) => Some((Err(err), None)),
        }
    })
}

#[derive(Deserialize)]
struct ViewerQuery {
    file: String,
    #[serde(default)]
    q: Option<String>,
}

async fn viewer(Query(query): Query<ViewerQuery>) -> Result<Redirect, AppError> {
    Ok(Redirect::temporary(viewer_url(&query.file, query.q.as_deref())?.as_str()))
}

fn viewer_url(file: &str, q: Option<&str>) -> Result<reqwest::Url, AppError> {
    let mut url = reqwest::Url::parse_with_params(PDF_VIEWER_URL, &[("file", file)])
        .map_err(|err| AppError::BadRequest(format!("Invalid viewer target: {err}")))?;
    if let Some(q) = q.map(str::trim).filter(|q| !q.is_empty()) {
        url.set_fragment(Some(&format!("search={q}")));
    }
    Ok(url)
}

async fn stats<S>(State(service): State<Arc<S>>) -> Result<Json<StatsReport>, AppError>
where
    S: SearchApi,
{
    let root = service.doc_root().to_path_buf();
    let disk = tokio::task::spawn_blocking(move || scan_disk_stats(&root))
        .await
        .map_err(|err| AppError::Internal(format!("Disk scan task failed: {err}")))?;
    let index = service
        .index_stats()
        .await
        .map_err(|err| AppError::BadGateway(err.to_string()))?;
    Ok(Json(StatsReport::new(disk, index)))
}

enum AppError {
    Search(SearchError),
    File(FileAccessError),
    BadRequest(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Search(SearchError::Engine(OpenSearchError::UnexpectedStatus { status, body })) => {
                let status =
                    StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
                let content_type = if serde_json::from_str::<Value>(&body).is_ok() {
                    "application/json"
                } else {
                    "text/plain; charset=utf-8"
                };
                (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
            }
            Self::Search(SearchError::Engine(OpenSearchError::NotFound(id))) => {
                (StatusCode::NOT_FOUND, format!("Document not found: {id}")).into_response()
            }
            Self::Search(err) => {
                tracing::error!(error = %err, "Search engine unavailable");
                (StatusCode::BAD_GATEWAY, err.to_string()).into_response()
            }
            Self::File(err @ FileAccessError::Forbidden) => {
                (StatusCode::FORBIDDEN, err.to_string()).into_response()
            }
            Self::File(err @ FileAccessError::NotFound) => {
                (StatusCode::NOT_FOUND, err.to_string()).into_response()
            }
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::BadGateway(message) => (StatusCode::BAD_GATEWAY, message).into_response(),
            Self::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}

impl From<SearchError> for AppError {
    fn from(inner: SearchError) -> Self {
        Self::Search(inner)
    }
}

impl From<FileAccessError> for AppError {
    fn from(inner: FileAccessError) -> Self {
        Self::File(inner)
    }
}
