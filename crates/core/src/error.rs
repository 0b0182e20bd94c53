//! Error types for the counsel RAG service.
//!
//! This module defines a unified error enum covering all failure families in
//! the application: configuration, I/O, provider calls (embedding and
//! generation), vector store access, prompt templates, and ingestion.

use thiserror::Error;

/// Unified error type for the counsel service.
///
/// All fallible functions return `Result<T, AppError>`. We never panic;
/// errors must be represented and propagated. Policy denials are NOT errors,
/// just ordinary return values of the pipeline.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors: unknown providers, bad thresholds, malformed
    /// settings files. Fatal at process start.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding/generation provider errors (network, non-2xx, bad payload)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Vector store errors
    #[error("Vector store error: {0}")]
    Store(String),

    /// Prompt template errors (missing file, render failure)
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Document ingestion errors
    #[error("Ingest error: {0}")]
    Ingest(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
