//! Generation provider factory.
//!
//! Resolves the configured provider name to a concrete client at composition
//! time. Unsupported backends fail fast here, at startup, not at first call.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OllamaLlmConfig};
use counsel_core::{AppError, AppResult, Settings};
use std::sync::Arc;

/// Create a generation client from the application settings.
pub fn create_llm(settings: &Settings) -> AppResult<Arc<dyn LlmClient>> {
    match settings.providers.llm.as_str() {
        "ollama" => {
            let client = OllamaClient::new(OllamaLlmConfig {
                model_name: settings.ollama.llm.model_name.clone(),
                api_url: settings.ollama.api_url.clone(),
                temperature: settings.ollama.llm.temperature,
                timeout_s: settings.ollama.timeout_s,
            })?;
            Ok(Arc::new(client))
        }
        "openai" => Err(AppError::Config(
            "OpenAI generation provider not implemented yet".to_string(),
        )),
        other => Err(AppError::Config(format!("Unknown llm provider: {}", other))),
    }
}
