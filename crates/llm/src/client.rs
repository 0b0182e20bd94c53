//! Generation provider abstraction.
//!
//! The pipeline consumes a generation provider through this trait: a prompt
//! goes in, and either a whole answer or a lazy token stream comes out.

use counsel_core::AppResult;
use futures::Stream;
use std::pin::Pin;

/// Lazy, finite, non-restartable stream of answer fragments.
///
/// Concatenating all fragments yields the same text the non-streaming call
/// would have produced for the same prompt and model settings.
pub type TokenStream = Pin<Box<dyn Stream<Item = AppResult<String>> + Send>>;

/// Trait for generation providers (Ollama, OpenAI, ...).
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync + std::fmt::Debug {
    /// Get the provider name (e.g., "ollama").
    fn provider_name(&self) -> &str;

    /// Generate a complete answer for the given prompt (blocking call).
    async fn generate(&self, prompt: &str) -> AppResult<String>;

    /// Generate an answer as a stream of text fragments in arrival order.
    async fn generate_stream(&self, prompt: &str) -> AppResult<TokenStream>;
}
