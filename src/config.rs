use serde::Deserialize;
use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration shared by the search API and the ingester.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the OpenSearch cluster.
    pub opensearch_url: String,
    /// Name of the index holding document records.
    pub index_name: String,
    /// Base URL of the Apache Tika server used for text extraction.
    pub tika_url: String,
    /// Root folder scanned for `level1/level2/**` documents.
    pub doc_root: PathBuf,
    /// JSON mapping body used when the index has to be created.
    pub index_mapping_file: PathBuf,
    /// Optional allow-list of level1 folder names.
    pub filter_level1: BTreeSet<String>,
    /// Optional allow-list of level2 folder names.
    pub filter_level2: BTreeSet<String>,
    /// Stop scanning after this many documents (`0` disables the limit).
    pub max_docs: usize,
    /// Files above this size (in MiB) are indexed without extraction.
    pub max_ocr_mb: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";
const DEFAULT_INDEX_NAME: &str = "ndf-docs";
const DEFAULT_TIKA_URL: &str = "http://localhost:9998";
const DEFAULT_DOC_ROOT: &str = "data/Note de frais";
const DEFAULT_MAPPING_FILE: &str = "opensearch-index.json";
const DEFAULT_MAX_OCR_MB: u64 = 30;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            opensearch_url: load_env_or("OPENSEARCH_URL", DEFAULT_OPENSEARCH_URL),
            index_name: load_env_or("INDEX_NAME", DEFAULT_INDEX_NAME),
            tika_url: load_env_or("TIKA_URL", DEFAULT_TIKA_URL),
            doc_root: PathBuf::from(load_env_or("DOC_ROOT", DEFAULT_DOC_ROOT)),
            index_mapping_file: PathBuf::from(load_env_or(
                "INDEX_MAPPING_FILE",
                DEFAULT_MAPPING_FILE,
            )),
            filter_level1: parse_name_list(load_env_optional("FILTER_LEVEL1").as_deref()),
            filter_level2: parse_name_list(load_env_optional("FILTER_LEVEL2").as_deref()),
            max_docs: parse_optional("MAX_DOCS")?.unwrap_or(0),
            max_ocr_mb: parse_optional("MAX_OCR_MB")?.unwrap_or(DEFAULT_MAX_OCR_MB),
            server_port: parse_optional("SERVER_PORT")?,
        })
    }

    /// Extraction size ceiling in bytes.
    pub fn max_ocr_bytes(&self) -> u64 {
        self.max_ocr_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            opensearch_url: DEFAULT_OPENSEARCH_URL.into(),
            index_name: DEFAULT_INDEX_NAME.into(),
            tika_url: DEFAULT_TIKA_URL.into(),
            doc_root: PathBuf::from(DEFAULT_DOC_ROOT),
            index_mapping_file: PathBuf::from(DEFAULT_MAPPING_FILE),
            filter_level1: BTreeSet::new(),
            filter_level2: BTreeSet::new(),
            max_docs: 0,
            max_ocr_mb: DEFAULT_MAX_OCR_MB,
            server_port: None,
        }
    }
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

/// Split a comma-separated list of folder names, dropping blanks.
pub fn parse_name_list(raw: Option<&str>) -> BTreeSet<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
///
/// Runs before tracing is installed, so call [`Config::log_summary`] once logging is up.
pub fn init_config() -> Result<(), ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let _ = CONFIG.set(config);
    Ok(())
}

impl Config {
    /// Emit the effective settings at debug level.
    pub fn log_summary(&self) {
        tracing::debug!(
            opensearch_url = %self.opensearch_url,
            index = %self.index_name,
            tika_url = %self.tika_url,
            doc_root = %self.doc_root.display(),
            max_docs = self.max_docs,
            max_ocr_mb = self.max_ocr_mb,
            server_port = ?self.server_port,
            "Loaded configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_list_trims_and_drops_blanks() {
        let names = parse_name_list(Some(" Paris, ,Lyon,,Nantes "));
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["Lyon".to_string(), "Nantes".into(), "Paris".into()]
        );
    }

    #[test]
    fn name_list_defaults_to_empty() {
        assert!(parse_name_list(None).is_empty());
        assert!(parse_name_list(Some("  ")).is_empty());
    }

    #[test]
    fn max_ocr_bytes_scales_megabytes() {
        let config = Config {
            max_ocr_mb: 2,
            ..Config::default()
        };
        assert_eq!(config.max_ocr_bytes(), 2 * 1024 * 1024);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn summary_reaches_an_installed_subscriber() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let config = Config {
            index_name: "expenses".into(),
            ..Config::default()
        };

        tracing::subscriber::with_default(subscriber, || config.log_summary());

        let output = String::from_utf8(logs.0.lock().expect("lock").clone()).expect("utf8");
        assert!(output.contains("Loaded configuration"), "got: {output}");
        assert!(output.contains("expenses"), "got: {output}");
    }
}
