//! Counsel Core Library
//!
//! Foundational utilities for the counsel RAG service:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management
//! - Shared chat/citation types

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use config::Settings;
pub use error::{AppError, AppResult};
pub use types::{ChatEvent, ChatRequest, ChatResponse, ChatTurn, Citation, Role};
