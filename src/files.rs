//! Access to original documents under the document root.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Reasons a requested file cannot be served.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FileAccessError {
    /// Path resolves outside the document root.
    #[error("path is outside the document root")]
    Forbidden,
    /// Path is inside the root but no such file exists.
    #[error("file not found")]
    NotFound,
}

/// Resolve `requested` to a regular file located under `root`.
///
/// Relative requests are taken relative to `root`. Symlinks and `..` segments are resolved
/// before the containment check, and `root` itself may be relative to the working directory.
pub fn resolve_under_root(root: &Path, requested: &Path) -> Result<PathBuf, FileAccessError> {
    if requested
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(FileAccessError::Forbidden);
    }
    let canonical_root = root.canonicalize().map_err(|_| FileAccessError::NotFound)?;
    let anchored = anchor_to_root(root, &canonical_root, requested);
    let resolved = match anchored.canonicalize() {
        Ok(resolved) => resolved,
        Err(_) if anchored.starts_with(&canonical_root) => return Err(FileAccessError::NotFound),
        Err(_) => return Err(FileAccessError::Forbidden),
    };
    if !resolved.starts_with(&canonical_root) {
        return Err(FileAccessError::Forbidden);
    }
    if !resolved.is_file() {
        return Err(FileAccessError::NotFound);
    }
    Ok(resolved)
}

/// Rewrite `requested` onto the canonical root when it is spelled through the configured one.
fn anchor_to_root(root: &Path, canonical_root: &Path, requested: &Path) -> PathBuf {
    if let Ok(rest) = requested.strip_prefix(root) {
        canonical_root.join(rest)
    } else if requested.is_relative() {
        canonical_root.join(requested)
    } else {
        requested.to_path_buf()
    }
}

/// MIME type served for a document, keyed by extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("xls") => "application/vnd.ms-excel",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
