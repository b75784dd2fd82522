//! Tracing setup shared by the API server and the ingester.
//!
//! Each binary logs to stdout and appends to its own file, `logs/<component>.log`, so a long
//! ingestion run does not interleave with request logs. `NDF_LOG_FILE` overrides the file path
//! for both.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_DIR: &str = "logs";
const LOG_FILE_ENV: &str = "NDF_LOG_FILE";

/// Install the stdout and file layers for `component` (e.g. `ndf-search`, `ndf-ingest`).
///
/// Filtering follows `RUST_LOG`, falling back to `info`.
pub fn init_tracing(component: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).compact());

    let log_path = log_file_path(component, std::env::var(LOG_FILE_ENV).ok().as_deref());
    match open_writer(&log_path) {
        Some(writer) => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_ansi(false),
            )
            .init(),
        None => registry.init(),
    }
}

/// File that receives the logs of `component`.
fn log_file_path(component: &str, override_path: Option<&str>) -> PathBuf {
    match override_path.map(str::trim).filter(|path| !path.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => Path::new(LOG_DIR).join(format!("{component}.log")),
    }
}

/// Open `path` for appending behind a non-blocking writer; `None` keeps stdout-only logging.
fn open_writer(path: &Path) -> Option<NonBlocking> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        if let Err(err) = std::fs::create_dir_all(parent) {
            eprintln!("Failed to create log directory {}: {err}", parent.display());
            return None;
        }
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path);
    match file {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}
