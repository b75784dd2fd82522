//! Document records written to the index.

use super::scan::ScannedFile;
use crate::tika::{ExtractionClient, file_stem};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::IngestError;

/// Record stored in the index for each scanned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Index identifier, derived from the absolute path.
    pub id: String,
    /// Absolute file path.
    pub path: String,
    /// File name including extension.
    pub file_name: String,
    /// First folder below the scan root.
    pub level1: String,
    /// Second folder below the scan root.
    pub level2: String,
    /// Folders between `level2` and the file.
    pub relative_subpath: String,
    /// Extracted title or file stem.
    pub title: String,
    /// Extracted text body.
    pub content: String,
    /// Detected MIME type.
    pub media_type: String,
    /// Lower-case extension without dot.
    pub ext: String,
    /// Last modification time, RFC3339 UTC.
    pub modified_at: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// SHA-256 of the file content.
    pub sha256: String,
    /// Completion terms: level names and title.
    pub suggest: Vec<String>,
}

/// What happened to the text extraction step of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// Text and metadata came from the extraction service.
    Extracted,
    /// File exceeded the size ceiling; indexed without content.
    SkippedTooLarge,
    /// Extraction service failed; indexed without content.
    Failed,
}

/// Stable index identifier for a file: hex SHA-256 of its absolute path.
pub fn document_id(path: &Path) -> String {
    hex::encode(Sha256::digest(path.to_string_lossy().as_bytes()))
}

/// Stream the file through SHA-256.
pub fn compute_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn to_rfc3339(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

fn suggest_terms(terms: [&str; 3]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(terms.len());
    for term in terms {
        if !term.is_empty() && !out.iter().any(|existing| existing == term) {
            out.push(term.to_string());
        }
    }
    out
}

/// Build the index record for `file`, extracting text when it is small enough.
///
/// Extraction failures never fail the record; they only leave `content` empty.
pub async fn build_record(
    file: &ScannedFile,
    extractor: &dyn ExtractionClient,
    max_ocr_bytes: u64,
) -> Result<(DocumentRecord, ExtractionOutcome), IngestError> {
    let io_error = |source| IngestError::Io {
        path: file.path.display().to_string(),
        source,
    };
    let metadata = tokio::fs::metadata(&file.path).await.map_err(io_error)?;
    let hash_path = file.path.clone();
    let sha256 = tokio::task::spawn_blocking(move || compute_sha256(&hash_path))
        .await
        .map_err(|join| io_error(std::io::Error::other(join)))?
        .map_err(io_error)?;

    let size_bytes = metadata.len();
    let (extraction, outcome) = if size_bytes > max_ocr_bytes {
        tracing::info!(
            path = %file.path.display(),
            size_bytes,
            max_ocr_bytes,
            "File too large for extraction; indexing metadata only"
        );
        (None, ExtractionOutcome::SkippedTooLarge)
    } else {
        match extractor.extract(&file.path).await {
            Ok(extraction) => (Some(extraction), ExtractionOutcome::Extracted),
            Err(error) => {
                tracing::warn!(
                    path = %file.path.display(),
                    error = %error,
                    "Extraction failed; indexing metadata only"
                );
                (None, ExtractionOutcome::Failed)
            }
        }
    };

    let extraction = extraction.unwrap_or_default();
    let title = if extraction.title.trim().is_empty() {
        file_stem(&file.path)
    } else {
        extraction.title
    };
    let modified_at = metadata
        .modified()
        .map(to_rfc3339)
        .unwrap_or_else(|_| to_rfc3339(SystemTime::UNIX_EPOCH));

    let record = DocumentRecord {
        id: document_id(&file.path),
        path: file.path.display().to_string(),
        file_name: file.file_name.clone(),
        level1: file.level1.clone(),
        level2: file.level2.clone(),
        relative_subpath: file.relative_subpath.clone(),
        suggest: suggest_terms([&file.level1, &file.level2, &title]),
        title,
        content: extraction.content,
        media_type: extraction.media_type,
        ext: file.ext.clone(),
        modified_at,
        size_bytes,
        sha256,
    };
    Ok((record, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tika::{Extraction, TikaError};
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct FixedExtractor(Result<Extraction, ()>);

    #[async_trait]
    impl ExtractionClient for FixedExtractor {
        async fn extract(&self, _path: &Path) -> Result<Extraction, TikaError> {
            self.0.clone().map_err(|()| TikaError::UnexpectedStatus {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "boom".into(),
            })
        }
    }

    fn scanned(dir: &Path, bytes: &[u8]) -> ScannedFile {
        let path = dir.join("facture.pdf");
        std::fs::write(&path, bytes).expect("write");
        ScannedFile {
            path,
            file_name: "facture.pdf".into(),
            level1: "2023".into(),
            level2: "Mars".into(),
            ext: "pdf".into(),
            relative_subpath: "taxi".into(),
        }
    }

    #[test]
    fn document_id_is_stable_per_path() {
        let a = document_id(&PathBuf::from("/data/A/B/x.pdf"));
        assert_eq!(a, document_id(&PathBuf::from("/data/A/B/x.pdf")));
        assert_ne!(a, document_id(&PathBuf::from("/data/A/B/y.pdf")));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn sha256_matches_known_digest() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("abc.pdf");
        std::fs::write(&path, b"abc").expect("write");
        assert_eq!(
            compute_sha256(&path).expect("hash"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn suggest_terms_dedupes_and_skips_empty() {
        assert_eq!(
            suggest_terms(["2023", "", "2023"]),
            vec!["2023".to_string()]
        );
    }

    #[tokio::test]
    async fn record_carries_levels_and_extracted_text() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = scanned(dir.path(), b"pdf bytes");
        let extractor = FixedExtractor(Ok(Extraction {
            title: "Taxi Paris".into(),
            content: "42 EUR".into(),
            media_type: "application/pdf".into(),
        }));

        let (record, outcome) = build_record(&file, &extractor, 1024)
            .await
            .expect("record");

        assert_eq!(outcome, ExtractionOutcome::Extracted);
        assert_eq!(record.level1, "2023");
        assert_eq!(record.level2, "Mars");
        assert_eq!(record.relative_subpath, "taxi");
        assert_eq!(record.title, "Taxi Paris");
        assert_eq!(record.content, "42 EUR");
        assert_eq!(record.size_bytes, 9);
        assert_eq!(record.id, document_id(&file.path));
        assert_eq!(record.suggest, vec!["2023", "Mars", "Taxi Paris"]);
        assert!(record.modified_at.contains('T'));
    }

    #[tokio::test]
    async fn extraction_failure_still_yields_record() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = scanned(dir.path(), b"pdf bytes");

        let (record, outcome) = build_record(&file, &FixedExtractor(Err(())), 1024)
            .await
            .expect("record");

        assert_eq!(outcome, ExtractionOutcome::Failed);
        assert_eq!(record.title, "facture");
        assert_eq!(record.content, "");
    }

    #[tokio::test]
    async fn large_files_skip_extraction() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = scanned(dir.path(), &[0u8; 32]);
        let extractor = FixedExtractor(Ok(Extraction {
            title: "never used".into(),
            content: "never used".into(),
            media_type: String::new(),
        }));

        let (record, outcome) = build_record(&file, &extractor, 16).await.expect("record");

        assert_eq!(outcome, ExtractionOutcome::SkippedTooLarge);
        assert_eq!(record.content, "");
        assert_eq!(record.title, "facture");
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let file = ScannedFile {
            path: PathBuf::from("/no/such/A/B/x.pdf"),
            file_name: "x.pdf".into(),
            level1: "A".into(),
            level2: "B".into(),
            ext: "pdf".into(),
            relative_subpath: String::new(),
        };
        let error = build_record(&file, &FixedExtractor(Err(())), 1024)
            .await
            .expect_err("should fail");
        assert!(matches!(error, IngestError::Io { .. }));
    }
}
