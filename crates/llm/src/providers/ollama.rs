//! Ollama generation provider.
//!
//! Talks to a local Ollama server via its HTTP API.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, TokenStream};
use counsel_core::{AppError, AppResult};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the Ollama generation client.
#[derive(Debug, Clone)]
pub struct OllamaLlmConfig {
    pub model_name: String,
    pub api_url: String,
    pub temperature: f32,
    pub timeout_s: u64,
}

/// Ollama `/api/generate` request format.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// One `/api/generate` response object. In streaming mode Ollama sends one of
/// these per line (newline-delimited JSON).
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

/// Ollama generation client.
#[derive(Debug)]
pub struct OllamaClient {
    cfg: OllamaLlmConfig,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(cfg: OllamaLlmConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_s))
            .build()
            .map_err(|e| AppError::Provider(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { cfg, client })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.cfg.api_url)
    }

    async fn post_generate(&self, prompt: &str, stream: bool) -> AppResult<reqwest::Response> {
        let request = GenerateRequest {
            model: &self.cfg.model_name,
            prompt,
            stream,
            options: GenerateOptions {
                temperature: self.cfg.temperature,
            },
        };

        let response = self
            .client
            .post(self.generate_url())
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
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> AppResult<String> {
        tracing::debug!(model = %self.cfg.model_name, "Sending completion request to Ollama");

        let response = self.post_generate(prompt, false).await?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse Ollama response: {}", e)))?;

        Ok(body.response.trim().to_string())
    }

    async fn generate_stream(&self, prompt: &str) -> AppResult<TokenStream> {
        tracing::debug!(model = %self.cfg.model_name, "Starting streaming request to Ollama");

        let response = self.post_generate(prompt, true).await?;

        // Ollama streams newline-delimited JSON; chunks may split a line, so
        // carry a partial-line buffer between reads.
        let bytes = Box::pin(response.bytes_stream());
        let stream = futures::stream::try_unfold(
            (bytes, String::new()),
            |(mut bytes, mut buf)| async move {
                loop {
                    while let Some(pos) = buf.find('\n') {
                        let line: String = buf.drain(..=pos).collect();
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        let chunk: GenerateResponse = serde_json::from_str(line).map_err(|e| {
                            AppError::Provider(format!("Failed to parse Ollama chunk: {}", e))
                        })?;
                        if chunk.done {
                            return Ok(None);
                        }
                        if !chunk.response.is_empty() {
                            return Ok(Some((chunk.response, (bytes, buf))));
                        }
                    }
                    match bytes.next().await {
                        Some(Ok(b)) => buf.push_str(&String::from_utf8_lossy(&b)),
                        Some(Err(e)) => {
                            return Err(AppError::Provider(format!("Ollama stream error: {}", e)))
                        }
                        None => return Ok(None),
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}
