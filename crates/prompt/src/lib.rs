//! Prompt system for the counsel service.
//!
//! Loads the system/answer/rewrite template bundle from disk, formats chat
//! history, and assembles the final generation prompt (including the
//! weak-evidence quote policy).

pub mod builder;
pub mod loader;
pub mod types;

pub use builder::{render_template, PromptBuilder};
pub use loader::{load_bundle, PromptStore};
pub use types::PromptBundle;
