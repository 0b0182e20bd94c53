//! Vector store abstraction.
//!
//! The store is a black-box approximate-nearest-neighbor service with
//! optional exact-match metadata filtering; ranking semantics beyond the
//! returned distances belong to the retriever.

pub mod chroma;
pub mod memory;

use counsel_core::{AppError, AppResult, Settings};
use serde::Serialize;
use std::sync::Arc;

/// Free-form metadata attached to each stored passage.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Single-category retrieval scope: an exact match on `doc_type`.
///
/// At most one category is ever active; serializes to the one-key mapping
/// the store expects as its `where` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocFilter {
    pub doc_type: String,
}

impl DocFilter {
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
        }
    }
}

/// Query output: one inner sequence per query embedding, rank-unordered
/// candidates inside.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub metadatas: Vec<Vec<Option<Metadata>>>,
    pub distances: Vec<Vec<f32>>,
}

/// Trait for vector stores.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Store passages with their embeddings and metadata, replacing on id.
    async fn upsert(
        &self,
        ids: &[String],
        documents: &[String],
        embeddings: &[Vec<f32>],
        metadatas: &[Metadata],
    ) -> AppResult<()>;

    /// Nearest-neighbor search under an optional metadata filter.
    async fn query(
        &self,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        filter: Option<&DocFilter>,
    ) -> AppResult<QueryResult>;

    /// Number of stored passages.
    async fn count(&self) -> AppResult<usize>;
}

/// Create a vector store from the application settings.
pub async fn create_store(settings: &Settings) -> AppResult<Arc<dyn VectorStore>> {
    match settings.providers.store.as_str() {
        "chroma" => {
            let store = chroma::ChromaStore::connect(chroma::ChromaStoreConfig {
                api_url: settings.rag.chroma_url.clone(),
                collection_name: settings.rag.collection_name.clone(),
                timeout_s: chroma::DEFAULT_TIMEOUT_SECS,
            })
            .await?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(memory::MemoryStore::new())),
        other => Err(AppError::Config(format!("Unknown store provider: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_filter_serialization() {
        let filter = DocFilter::new("memo");
        let json = serde_json::to_string(&filter).unwrap();
        assert_eq!(json, r#"{"doc_type":"memo"}"#);
    }

    #[tokio::test]
    async fn test_create_memory_store() {
        let mut settings = Settings::default();
        settings.providers.store = "memory".to_string();
        let store = create_store(&settings).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_unknown_store() {
        let mut settings = Settings::default();
        settings.providers.store = "faiss".to_string();
        assert!(create_store(&settings).await.is_err());
    }
}
