//! Prompt template loading.

use crate::types::PromptBundle;
use counsel_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Loads the system/answer/rewrite templates from a directory and caches the
/// bundle for the process lifetime.
///
/// Duplicate population under concurrency is harmless: the inputs are
/// deterministic, so racing loaders produce the same bundle.
pub struct PromptStore {
    root: PathBuf,
    cache: Mutex<Option<PromptBundle>>,
}

impl PromptStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(None),
        }
    }

    /// Load the template bundle, reusing the cached copy unless
    /// `force_reload` is set. Fails fast if any template file is absent.
    pub fn load(&self, force_reload: bool) -> AppResult<PromptBundle> {
        if !force_reload {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(bundle) = cache.as_ref() {
                return Ok(bundle.clone());
            }
        }

        let bundle = PromptBundle {
            system: self.read_template("system.txt")?,
            answer: self.read_template("answer.txt")?,
            rewrite: self.read_template("rewrite.txt")?,
        };

        tracing::debug!(root = ?self.root, "Loaded prompt templates");

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        *cache = Some(bundle.clone());
        Ok(bundle)
    }

    fn read_template(&self, filename: &str) -> AppResult<String> {
        let path = self.root.join(filename);
        if !path.exists() {
            return Err(AppError::Prompt(format!(
                "Prompt template not found: {:?}",
                path
            )));
        }
        let text = std::fs::read_to_string(&path).map_err(|e| {
            AppError::Prompt(format!("Failed to read prompt template {:?}: {}", path, e))
        })?;
        Ok(text.trim().to_string())
    }
}

/// Convenience: load the bundle from `dir` without keeping the store around.
pub fn load_bundle(dir: &Path) -> AppResult<PromptBundle> {
    PromptStore::new(dir).load(false)
}
