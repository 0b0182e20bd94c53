//! Ollama embedding provider.
//!
//! Uses Ollama's `/api/embeddings` endpoint with models like
//! nomic-embed-text. Local-first; no API key required.

use crate::embeddings::Embedder;
use counsel_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Ollama embedding client.
#[derive(Debug)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(model: String, base_url: String, timeout_s: u64) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_s))
            .build()
            .map_err(|e| AppError::Provider(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url,
            model,
        })
    }
}

#[async_trait::async_trait]
impl Embedder for OllamaEmbedder {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to send request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Provider(format!(
                "Ollama embeddings error ({}): {}",
                status, error_text
            )));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::Provider(format!("Failed to parse Ollama embedding response: {}", e))
        })?;

        Ok(body.embedding)
    }
}
