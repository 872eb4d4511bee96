//! Document loading
//!
//! Walks a directory and turns its supported files into chunks ready for
//! embedding:
//! - `.json`: `{ "text": ..., "filename": ... }`, taken whole
//! - `.pdf`: extracted page by page, each page split by the sliding-window
//!   chunker
//!
//! Unsupported extensions are skipped. A file that fails to parse is logged
//! and skipped; it never aborts the directory.

use crate::chunker::{chunk_text, ChunkingConfig};
use crate::errors::IngestionError;
use crate::pdf::extract_pages;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// One embeddable unit of text with its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub text: String,
    /// Source filename
    pub source: String,
    /// Page number, for chunks that came from a PDF
    pub page: Option<u32>,
}

#[derive(Deserialize)]
struct JsonDocument {
    text: String,
    filename: Option<String>,
}

/// Load every supported document under `dir` into chunks
pub fn load_directory(
    dir: &Path,
    config: &ChunkingConfig,
) -> Result<Vec<DocumentChunk>, IngestionError> {
    if !dir.is_dir() {
        return Err(IngestionError::InvalidDocument {
            path: dir.display().to_string(),
            message: "not a directory".to_string(),
        });
    }

    let mut chunks = Vec::new();
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();

    for path in entries {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let result = match ext.as_deref() {
            Some("json") => load_json(&path, &mut chunks),
            Some("pdf") => load_pdf(&path, config, &mut chunks),
            _ => continue,
        };

        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Skipping unreadable document");
        }
    }

    info!(
        dir = %dir.display(),
        chunk_count = chunks.len(),
        "Directory loaded"
    );

    Ok(chunks)
}

fn load_json(path: &Path, chunks: &mut Vec<DocumentChunk>) -> Result<(), IngestionError> {
    let raw = std::fs::read_to_string(path)?;
    let doc: JsonDocument =
        serde_json::from_str(&raw).map_err(|e| IngestionError::InvalidDocument {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    if doc.text.trim().is_empty() {
        return Err(IngestionError::InvalidDocument {
            path: path.display().to_string(),
            message: "empty text field".to_string(),
        });
    }

    let source = doc.filename.unwrap_or_else(|| file_name(path));

    chunks.push(DocumentChunk {
        text: doc.text,
        source,
        page: None,
    });

    Ok(())
}

fn load_pdf(
    path: &Path,
    config: &ChunkingConfig,
    chunks: &mut Vec<DocumentChunk>,
) -> Result<(), IngestionError> {
    let source = file_name(path);

    for (page, text) in extract_pages(path)? {
        for chunk in chunk_text(&text, config) {
            chunks.push(DocumentChunk {
                text: chunk.content,
                source: source.clone(),
                page: Some(page),
            });
        }
    }

    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("chatdock-loader-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_json_documents() {
        let dir = temp_dir();
        std::fs::write(
            dir.join("faq.json"),
            r#"{ "text": "We ship worldwide.", "filename": "faq.txt" }"#,
        )
        .unwrap();

        let chunks = load_directory(&dir, &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "We ship worldwide.");
        assert_eq!(chunks[0].source, "faq.txt");
        assert_eq!(chunks[0].page, None);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_json_filename_defaults_to_file() {
        let dir = temp_dir();
        std::fs::write(dir.join("notes.json"), r#"{ "text": "hello" }"#).unwrap();

        let chunks = load_directory(&dir, &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks[0].source, "notes.json");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_malformed_json_is_skipped() {
        let dir = temp_dir();
        std::fs::write(dir.join("bad.json"), "not json at all").unwrap();
        std::fs::write(dir.join("good.json"), r#"{ "text": "kept" }"#).unwrap();

        let chunks = load_directory(&dir, &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "kept");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unsupported_extensions_ignored() {
        let dir = temp_dir();
        std::fs::write(dir.join("readme.txt"), "ignored").unwrap();

        let chunks = load_directory(&dir, &ChunkingConfig::default()).unwrap();
        assert!(chunks.is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_directory_errors() {
        let dir = std::env::temp_dir().join("chatdock-loader-does-not-exist");
        assert!(load_directory(&dir, &ChunkingConfig::default()).is_err());
    }
}
