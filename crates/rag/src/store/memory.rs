//! In-memory vector store with exact cosine search.
//!
//! Offline stand-in for a real ANN service; used in tests and local
//! development. Distances are cosine distances (1 - similarity), matching
//! the metric space the retrieval thresholds assume.

use crate::embeddings::cosine_similarity;
use crate::store::{DocFilter, Metadata, QueryResult, VectorStore};
use counsel_core::{AppError, AppResult};
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct Record {
    id: String,
    document: String,
    embedding: Vec<f32>,
    metadata: Metadata,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(record: &Record, filter: Option<&DocFilter>) -> bool {
        match filter {
            None => true,
            Some(f) => record
                .metadata
                .get("doc_type")
                .and_then(|v| v.as_str())
                .map(|dt| dt == f.doc_type)
                .unwrap_or(false),
        }
    }
}

#[async_trait::async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(
        &self,
        ids: &[String],
        documents: &[String],
        embeddings: &[Vec<f32>],
        metadatas: &[Metadata],
    ) -> AppResult<()> {
        if ids.len() != documents.len()
            || ids.len() != embeddings.len()
            || ids.len() != metadatas.len()
        {
            return Err(AppError::Store(
                "upsert requires ids, documents, embeddings and metadatas of equal length"
                    .to_string(),
            ));
        }

        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        for i in 0..ids.len() {
            let record = Record {
                id: ids[i].clone(),
                document: documents[i].clone(),
                embedding: embeddings[i].clone(),
                metadata: metadatas[i].clone(),
            };
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        filter: Option<&DocFilter>,
    ) -> AppResult<QueryResult> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let mut result = QueryResult::default();

        for query in query_embeddings {
            let mut scored: Vec<(&Record, f32)> = records
                .iter()
                .filter(|r| Self::matches(r, filter))
                .map(|r| (r, 1.0 - cosine_similarity(query, &r.embedding)))
                .collect();
            scored.sort_by(|a, b| a.1.total_cmp(&b.1));
            scored.truncate(n_results);

            result.ids.push(scored.iter().map(|(r, _)| r.id.clone()).collect());
            result
                .documents
                .push(scored.iter().map(|(r, _)| r.document.clone()).collect());
            result
                .metadatas
                .push(scored.iter().map(|(r, _)| Some(r.metadata.clone())).collect());
            result.distances.push(scored.iter().map(|(_, d)| *d).collect());
        }

        Ok(result)
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.records.read().unwrap_or_else(|e| e.into_inner()).len())
    }
}
