//! Index mapping loading.

use serde_json::{Value, json};
use std::path::Path;

/// Character limit the highlighter analyzes per field, set at index creation and on first search.
pub const HIGHLIGHT_MAX_ANALYZED_OFFSET: u64 = 10_000_000;

/// Read the mapping body used for index creation, falling back to [`default_mapping`].
pub fn load_mapping(path: &Path) -> Value {
    let parsed = std::fs::read_to_string(path)
        .map_err(|err| err.to_string())
        .and_then(|raw| serde_json::from_str::<Value>(&raw).map_err(|err| err.to_string()));
    match parsed {
        Ok(mapping) => {
            tracing::debug!(path = %path.display(), "Loaded index mapping");
            mapping
        }
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "Index mapping unavailable; using built-in mapping"
            );
            default_mapping()
        }
    }
}

/// Minimal mapping: keyword filters, analyzed text and a search-as-you-type field.
pub fn default_mapping() -> Value {
    json!({
        "settings": {
            "index": { "highlight.max_analyzed_offset": HIGHLIGHT_MAX_ANALYZED_OFFSET }
        },
        "mappings": {
            "properties": {
                "path": { "type": "keyword" },
                "file_name": { "type": "keyword" },
                "level1": { "type": "keyword" },
                "level2": { "type": "keyword" },
                "relative_subpath": { "type": "keyword" },
                "ext": { "type": "keyword" },
                "media_type": { "type": "keyword" },
                "sha256": { "type": "keyword" },
                "title": { "type": "text" },
                "content": { "type": "text" },
                "modified_at": { "type": "date" },
                "size_bytes": { "type": "long" },
                "suggest": { "type": "search_as_you_type" }
            }
        }
    })
}
