//! Folder traversal for `root/<level1>/<level2>/**` document trees.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// File extensions accepted for indexing (lower-case, without dot).
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["pdf", "doc", "docx", "xls", "xlsx"];

/// Prefix used by Office for lock files next to open documents.
const OFFICE_LOCK_PREFIX: &str = "~$";

/// Optional allow-lists restricting which level folders are scanned.
#[derive(Debug, Clone, Default)]
pub struct ScanFilters {
    /// Accepted level1 names; empty accepts all.
    pub level1: BTreeSet<String>,
    /// Accepted level2 names; empty accepts all.
    pub level2: BTreeSet<String>,
}

impl ScanFilters {
    fn accepts(allowed: &BTreeSet<String>, name: &str) -> bool {
        allowed.is_empty() || allowed.contains(name)
    }
}

/// A document discovered under the scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// File name including extension.
    pub file_name: String,
    /// First folder below the root.
    pub level1: String,
    /// Second folder below the root.
    pub level2: String,
    /// Lower-case extension without dot.
    pub ext: String,
    /// Folders between `level2` and the file, joined with `/`; empty when none.
    pub relative_subpath: String,
}

/// Whether a single path segment is hidden.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Whether the file name is an Office lock/temporary file.
pub fn is_office_lock_file(name: &str) -> bool {
    name.starts_with(OFFICE_LOCK_PREFIX)
}

/// Lower-case extension of `path` when it is one of [`SUPPORTED_EXTENSIONS`].
pub fn supported_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS
        .contains(&ext.as_str())
        .then_some(ext)
}

fn indexable_file_name(name: &str) -> bool {
    !is_hidden_name(name) && !is_office_lock_file(name)
}

/// List the documents under `root`, sorted by path.
///
/// Only files nested at least two folders deep are returned; loose files in the root or in a
/// level1 folder are ignored. A missing root yields an empty list. `max_docs == 0` means no
/// limit.
pub fn scan_documents(root: &Path, filters: &ScanFilters, max_docs: usize) -> Vec<ScannedFile> {
    let root = match root.canonicalize() {
        Ok(root) => root,
        Err(error) => {
            tracing::warn!(root = %root.display(), error = %error, "Document root unavailable");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for (level1, level1_dir) in visible_subdirectories(&root) {
        if !ScanFilters::accepts(&filters.level1, &level1) {
            continue;
        }
        for (level2, level2_dir) in visible_subdirectories(&level1_dir) {
            if !ScanFilters::accepts(&filters.level2, &level2) {
                continue;
            }
            for file in scan_level2(&level1, &level2, &level2_dir) {
                files.push(file);
                if max_docs > 0 && files.len() >= max_docs {
                    tracing::info!(max_docs, "Document limit reached");
                    return files;
                }
            }
        }
    }
    files
}

fn visible_subdirectories(dir: &Path) -> Vec<(String, PathBuf)> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) => {
            tracing::warn!(dir = %dir.display(), error = %error, "Cannot list directory");
            return Vec::new();
        }
    };
    let mut dirs: Vec<(String, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            let path = entry.path();
            (!is_hidden_name(&name) && path.is_dir()).then_some((name, path))
        })
        .collect();
    dirs.sort();
    dirs
}

fn scan_level2(level1: &str, level2: &str, level2_dir: &Path) -> Vec<ScannedFile> {
    WalkDir::new(level2_dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| !is_hidden_name(name))
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::warn!(error = %error, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(level2_dir).ok()?;
            build_scanned_file(entry.path(), level1, level2, relative)
        })
        .collect()
}

/// Assemble a [`ScannedFile`] from a path relative to its level2 folder.
fn build_scanned_file(
    path: &Path,
    level1: &str,
    level2: &str,
    relative_to_level2: &Path,
) -> Option<ScannedFile> {
    let file_name = path.file_name()?.to_str()?.to_string();
    if !indexable_file_name(&file_name) {
        return None;
    }
    let ext = supported_extension(path)?;
    let relative_subpath = relative_to_level2
        .parent()
        .map(|parent| {
            parent
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();

    Some(ScannedFile {
        path: path.to_path_buf(),
        file_name,
        level1: level1.to_string(),
        level2: level2.to_string(),
        ext,
        relative_subpath,
    })
}

/// Classify a single path (e.g. from a file-system event) relative to `root`.
///
/// Returns `None` for paths outside the root, files not nested two folders deep, hidden or
/// temporary files, and unsupported extensions.
pub fn derive_levels(root: &Path, path: &Path) -> Option<ScannedFile> {
    let root = root.canonicalize().ok()?;
    let path = path.canonicalize().ok()?;
    if !path.is_file() {
        return None;
    }
    let relative = path.strip_prefix(&root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => part.to_str().map(str::to_string),
            _ => None,
        })
        .collect::<Option<_>>()?;
    if segments.len() < 3 || segments.iter().any(|segment| is_hidden_name(segment)) {
        return None;
    }
    let level2_dir = root.join(&segments[0]).join(&segments[1]);
    let relative_to_level2 = path.strip_prefix(&level2_dir).ok()?;
    build_scanned_file(&path, &segments[0], &segments[1], relative_to_level2)
}
