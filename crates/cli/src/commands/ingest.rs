//! Ingest command handler.

use clap::Args;
use counsel_core::{AppResult, Settings};
use counsel_rag::ingest::{ingest_folder, IngestConfig};
use counsel_rag::{create_embedder, create_store};
use std::path::PathBuf;

/// Ingest PDF documents into the vector store
///
/// Expects one subdirectory per document category under the docs root
/// (e.g. `data/docs/memo/*.pdf`); the directory name becomes the doc_type
/// used by query routing.
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Root directory of the document tree (default: rag.docs_root)
    #[arg(long)]
    pub docs_root: Option<PathBuf>,

    /// Chunk size in characters
    #[arg(long, default_value_t = 1000)]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[arg(long, default_value_t = 200)]
    pub chunk_overlap: usize,
}

impl IngestCommand {
    pub async fn execute(&self, settings: &Settings) -> AppResult<()> {
        let embedder = create_embedder(settings)?;
        let store = create_store(settings).await?;

        let cfg = IngestConfig {
            docs_root: self
                .docs_root
                .clone()
                .unwrap_or_else(|| settings.rag.docs_root.clone()),
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        };

        let total = ingest_folder(&cfg, embedder.as_ref(), store.as_ref()).await?;

        println!(
            "Ingested {} chunks into collection '{}'",
            total, settings.rag.collection_name
        );
        Ok(())
    }
}
