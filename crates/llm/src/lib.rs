//! Generation provider integration for the counsel service.
//!
//! This crate provides a provider-agnostic abstraction for text generation
//! with both blocking and streaming completion, selected by configuration at
//! composition time.
//!
//! # Providers
//! - **Ollama**: local LLM runtime (default)
//! - Future: OpenAI
//!
//! # Example
//! ```no_run
//! use counsel_llm::providers::{OllamaClient, OllamaLlmConfig};
//! use counsel_llm::LlmClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new(OllamaLlmConfig {
//!     model_name: "llama3".to_string(),
//!     api_url: "http://localhost:11434".to_string(),
//!     temperature: 0.1,
//!     timeout_s: 120,
//! })?;
//! let answer = client.generate("Hello, world!").await?;
//! println!("{}", answer);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, TokenStream};
pub use factory::create_llm;
pub use providers::OllamaClient;
