//! Document ingestion pipeline.
//!
//! Walks `docs_root/<doc_type>/*.pdf`, extracts per-page text, windows it
//! into overlapping chunks, embeds them and upserts into the vector store.
//! The directory name is the document category used by query routing.

use crate::embeddings::Embedder;
use crate::ingest::chunker::chunk_text;
use crate::ingest::pdf::load_pdf;
use crate::store::{Metadata, VectorStore};
use counsel_core::{AppError, AppResult};
use std::path::PathBuf;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub docs_root: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            docs_root: PathBuf::from("data/docs"),
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Ingest every PDF under the docs root. Returns the total chunk count.
pub async fn ingest_folder(
    cfg: &IngestConfig,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
) -> AppResult<usize> {
    if !cfg.docs_root.exists() {
        return Err(AppError::Ingest(format!(
            "Docs root not found: {:?}",
            cfg.docs_root
        )));
    }

    let mut total_chunks = 0usize;

    for entry in WalkDir::new(&cfg.docs_root)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file()
            || path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| !e.eq_ignore_ascii_case("pdf"))
                .unwrap_or(true)
        {
            continue;
        }

        let doc_type = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_lowercase();
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.pdf")
            .to_string();

        let pages = load_pdf(path)?;
        tracing::info!(doc_type, source, pages = pages.len(), "Ingesting document");

        for page in &pages {
            let chunks = chunk_text(&page.text, cfg.chunk_size, cfg.chunk_overlap)?;
            if chunks.is_empty() {
                continue;
            }

            let ids: Vec<String> = (0..chunks.len())
                .map(|idx| format!("{}::p{}::c{}", source, page.page, idx))
                .collect();
            let metadatas: Vec<Metadata> = chunks
                .iter()
                .map(|_| {
                    let mut m = Metadata::new();
                    m.insert("source".to_string(), serde_json::json!(source));
                    m.insert("doc_type".to_string(), serde_json::json!(doc_type));
                    m.insert("page".to_string(), serde_json::json!(page.page));
                    m
                })
                .collect();

            let embeddings = embedder.embed_many(&chunks).await?;
            store.upsert(&ids, &chunks, &embeddings, &metadatas).await?;

            total_chunks += chunks.len();
        }
    }

    tracing::info!(total_chunks, "Ingestion complete");
    Ok(total_chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::mock::MockEmbedder;
    use crate::store::memory::MemoryStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_docs_root_errors() {
        let cfg = IngestConfig {
            docs_root: PathBuf::from("/definitely/not/here"),
            ..Default::default()
        };
        let embedder = MockEmbedder::new(64);
        let store = MemoryStore::new();
        assert!(ingest_folder(&cfg, &embedder, &store).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_docs_root_ingests_nothing() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("memo")).unwrap();

        let cfg = IngestConfig {
            docs_root: temp.path().to_path_buf(),
            ..Default::default()
        };
        let embedder = MockEmbedder::new(64);
        let store = MemoryStore::new();

        let total = ingest_folder(&cfg, &embedder, &store).await.unwrap();
        assert_eq!(total, 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_non_pdf_files_are_skipped() {
        let temp = TempDir::new().unwrap();
        let memo_dir = temp.path().join("memo");
        std::fs::create_dir(&memo_dir).unwrap();
        std::fs::write(memo_dir.join("notes.txt"), "not a pdf").unwrap();

        let cfg = IngestConfig {
            docs_root: temp.path().to_path_buf(),
            ..Default::default()
        };
        let embedder = MockEmbedder::new(64);
        let store = MemoryStore::new();

        let total = ingest_folder(&cfg, &embedder, &store).await.unwrap();
        assert_eq!(total, 0);
    }
}
