//! Chroma vector store client.
//!
//! Thin REST client for a Chroma server. The collection is created (or
//! loaded) once at connect time with cosine distance; queries include
//! documents, metadatas and distances.

use crate::store::{DocFilter, Metadata, QueryResult, VectorStore};
use counsel_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request timeout for store calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ChromaStoreConfig {
    pub api_url: String,
    pub collection_name: String,
    pub timeout_s: u64,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    get_or_create: bool,
    metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    ids: &'a [String],
    documents: &'a [String],
    embeddings: &'a [Vec<f32>],
    metadatas: &'a [Metadata],
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query_embeddings: &'a [Vec<f32>],
    n_results: usize,
    #[serde(skip_serializing_if = "Option::is_none", rename = "where")]
    where_filter: Option<&'a DocFilter>,
    include: [&'a str; 3],
}

/// Chroma's query payload; every field may be null.
#[derive(Debug, Deserialize)]
struct RawQueryResponse {
    #[serde(default)]
    ids: Option<Vec<Vec<String>>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
}

/// REST client for one Chroma collection.
pub struct ChromaStore {
    client: reqwest::Client,
    base_url: String,
    collection_id: String,
    collection_name: String,
}

impl ChromaStore {
    /// Connect to the server and get-or-create the collection.
    ///
    /// Fails fast when the server is unreachable, so a misconfigured store
    /// is caught at startup rather than at first query.
    pub async fn connect(cfg: ChromaStoreConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_s))
            .build()
            .map_err(|e| AppError::Store(format!("Failed to create HTTP client: {}", e)))?;

        let url = format!("{}/api/v1/collections", cfg.api_url);
        let request = CreateCollectionRequest {
            name: &cfg.collection_name,
            get_or_create: true,
            metadata: serde_json::json!({ "hnsw:space": "cosine" }),
        };

        let response = client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                AppError::Store(format!(
                    "Chroma not available at {}: {}",
                    cfg.api_url, e
                ))
            })?;

        let response = Self::check_status(response).await?;
        let info: CollectionInfo = response
            .json()
            .await
            .map_err(|e| AppError::Store(format!("Failed to parse Chroma collection: {}", e)))?;

        tracing::info!(
            collection = %cfg.collection_name,
            "Connected to Chroma collection"
        );

        Ok(Self {
            client,
            base_url: cfg.api_url,
            collection_id: info.id,
            collection_name: cfg.collection_name,
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/api/v1/collections/{}/{}",
            self.base_url, self.collection_id, suffix
        )
    }

    async fn check_status(response: reqwest::Response) -> AppResult<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Store(format!(
                "Chroma API error ({}): {}",
                status, error_text
            )));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl VectorStore for ChromaStore {
    async fn upsert(
        &self,
        ids: &[String],
        documents: &[String],
        embeddings: &[Vec<f32>],
        metadatas: &[Metadata],
    ) -> AppResult<()> {
        let request = UpsertRequest {
            ids,
            documents,
            embeddings,
            metadatas,
        };

        let response = self
            .client
            .post(self.collection_url("upsert"))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Store(format!("Chroma upsert failed: {}", e)))?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn query(
        &self,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        filter: Option<&DocFilter>,
    ) -> AppResult<QueryResult> {
        let request = QueryRequest {
            query_embeddings,
            n_results,
            where_filter: filter,
            include: ["documents", "metadatas", "distances"],
        };

        let response = self
            .client
            .post(self.collection_url("query"))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Store(format!("Chroma query failed: {}", e)))?;

        let response = Self::check_status(response).await?;
        let raw: RawQueryResponse = response
            .json()
            .await
            .map_err(|e| AppError::Store(format!("Failed to parse Chroma query response: {}", e)))?;

        Ok(QueryResult {
            ids: raw.ids.unwrap_or_default(),
            documents: raw
                .documents
                .unwrap_or_default()
                .into_iter()
                .map(|inner| inner.into_iter().map(Option::unwrap_or_default).collect())
                .collect(),
            metadatas: raw.metadatas.unwrap_or_default(),
            distances: raw.distances.unwrap_or_default(),
        })
    }

    async fn count(&self) -> AppResult<usize> {
        let response = self
            .client
            .get(self.collection_url("count"))
            .send()
            .await
            .map_err(|e| AppError::Store(format!("Chroma count failed: {}", e)))?;

        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| AppError::Store(format!("Failed to parse Chroma count: {}", e)))
    }
}
