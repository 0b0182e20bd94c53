//! Embedding providers.
//!
//! The same provider must be used for ingestion-time and query-time vectors;
//! that consistency is the composition root's obligation, not enforced here.

pub mod mock;
pub mod ollama;

use counsel_core::{AppError, AppResult, Settings};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "ollama", "mock")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Generate an embedding for a single text.
    async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_many(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_one(text).await?);
        }
        Ok(embeddings)
    }
}

/// Create an embedding provider from the application settings.
///
/// Unsupported backends fail fast here, at startup.
pub fn create_embedder(settings: &Settings) -> AppResult<Arc<dyn Embedder>> {
    match settings.providers.embedder.as_str() {
        "ollama" => Ok(Arc::new(ollama::OllamaEmbedder::new(
            settings.ollama.embeddings.model_name.clone(),
            settings.ollama.api_url.clone(),
            settings.ollama.timeout_s,
        )?)),
        "mock" => Ok(Arc::new(mock::MockEmbedder::new(384))),
        "openai" => Err(AppError::Config(
            "OpenAI embedding provider not implemented yet".to_string(),
        )),
        other => Err(AppError::Config(format!(
            "Unknown embedder provider: {}",
            other
        ))),
    }
}

/// Cosine similarity between two vectors; 0.0 when either has zero norm.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
