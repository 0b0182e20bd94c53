//! Configuration management.
//!
//! Settings are split across several YAML files in a `configs/` directory
//! (`app.yaml`, `providers.yaml`, `ollama.yaml`, `rag.yaml`, `policy.yaml`)
//! which are deep-merged in that order. Missing files are ignored so the
//! defaults apply and files can be added gradually. A handful of environment
//! variables override the merged result.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// File names merged into the settings tree, in merge order.
const CONFIG_FILES: [&str; 5] = [
    "app.yaml",
    "providers.yaml",
    "ollama.yaml",
    "rag.yaml",
    "policy.yaml",
];

/// Top-level application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub providers: ProviderSettings,
    pub ollama: OllamaSettings,
    pub rag: RagSettings,
    pub policy: PolicySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub app_name: String,
    pub log_level: String,
    /// Directory holding the system/answer/rewrite prompt templates.
    pub prompts_dir: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            app_name: "Counsel RAG Bot".to_string(),
            log_level: "info".to_string(),
            prompts_dir: PathBuf::from("prompts"),
        }
    }
}

/// Which backend implements each consumed capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Generation provider: "ollama" or "openai"
    pub llm: String,
    /// Embedding provider: "ollama", "openai" or "mock"
    pub embedder: String,
    /// Vector store: "chroma" or "memory"
    pub store: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            llm: "ollama".to_string(),
            embedder: "ollama".to_string(),
            store: "chroma".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub api_url: String,
    pub timeout_s: u64,
    pub llm: OllamaLlmSettings,
    pub embeddings: OllamaEmbeddingSettings,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:11434".to_string(),
            timeout_s: 120,
            llm: OllamaLlmSettings::default(),
            embeddings: OllamaEmbeddingSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaLlmSettings {
    pub model_name: String,
    pub temperature: f32,
}

impl Default for OllamaLlmSettings {
    fn default() -> Self {
        Self {
            model_name: "mistral:7b-instruct-q4_0".to_string(),
            temperature: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaEmbeddingSettings {
    pub model_name: String,
}

impl Default for OllamaEmbeddingSettings {
    fn default() -> Self {
        Self {
            model_name: "nomic-embed-text".to_string(),
        }
    }
}

/// Retrieval and prompt-packing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub collection_name: String,
    pub chroma_url: String,
    pub docs_root: PathBuf,
    pub top_k: usize,
    pub retrieval_pool_k: usize,
    pub max_context_chars: usize,
    pub max_chunks_in_prompt: usize,
    pub max_history: usize,
    pub distance: DistanceSettings,
    pub rewrite: RewriteSettings,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            collection_name: "counsel_kb".to_string(),
            chroma_url: "http://127.0.0.1:8000".to_string(),
            docs_root: PathBuf::from("data/docs"),
            top_k: 5,
            retrieval_pool_k: 25,
            max_context_chars: 3000,
            max_chunks_in_prompt: 3,
            max_history: 6,
            distance: DistanceSettings::default(),
            rewrite: RewriteSettings::default(),
        }
    }
}

/// Confidence thresholds over cosine distance (smaller = more relevant).
///
/// Invariant: `good_threshold < weak_threshold`. Best distance at or below
/// `good_threshold` is strong evidence; between the two is weak; above
/// `weak_threshold` is a deny.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceSettings {
    pub good_threshold: f32,
    pub weak_threshold: f32,
}

impl Default for DistanceSettings {
    fn default() -> Self {
        Self {
            good_threshold: 0.40,
            weak_threshold: 0.55,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteSettings {
    pub enabled: bool,
    pub trigger_max_words: usize,
    pub max_history_turns: usize,
    pub max_rewrite_chars: usize,
}

impl Default for RewriteSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_max_words: 8,
            max_history_turns: 6,
            max_rewrite_chars: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    pub deny_message: String,
    pub closing_message: String,
    pub require_quotes_in_weak_mode: bool,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            deny_message: "I couldn't find relevant information in the knowledge base."
                .to_string(),
            closing_message:
                "No problem - glad I could help! If you need anything else later, just ask."
                    .to_string(),
            require_quotes_in_weak_mode: true,
        }
    }
}

impl Settings {
    /// Load settings from a config directory, then apply env overrides.
    ///
    /// The directory defaults to `COUNSEL_CONFIG_DIR`, then `configs`.
    /// Environment variables:
    /// - `COUNSEL_CONFIG_DIR`: config directory
    /// - `OLLAMA_API_URL`: Ollama endpoint override
    /// - `RUST_LOG`: log level override
    pub fn load(config_dir: Option<&Path>) -> AppResult<Self> {
        let dir = match config_dir {
            Some(d) => d.to_path_buf(),
            None => std::env::var("COUNSEL_CONFIG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("configs")),
        };

        let mut merged = serde_yaml::Value::Mapping(Default::default());
        for name in CONFIG_FILES {
            let path = dir.join(name);
            if !path.exists() {
                continue;
            }
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
            })?;
            let value: serde_yaml::Value = serde_yaml::from_str(&contents).map_err(|e| {
                AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?;
            if value.is_null() {
                continue;
            }
            if !value.is_mapping() {
                return Err(AppError::Config(format!(
                    "Top-level YAML must be a mapping: {:?}",
                    path
                )));
            }
            merged = deep_merge(merged, value);
        }

        let mut settings: Settings = serde_yaml::from_value(merged)
            .map_err(|e| AppError::Config(format!("Malformed configuration: {}", e)))?;

        // Environment variables override file settings
        if let Ok(url) = std::env::var("OLLAMA_API_URL") {
            settings.ollama.api_url = url;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            settings.app.log_level = level;
        }

        Ok(settings)
    }

    /// Validate settings at startup, before the service accepts requests.
    pub fn validate(&self) -> AppResult<()> {
        let known_llm = ["ollama", "openai"];
        if !known_llm.contains(&self.providers.llm.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown llm provider: {}. Supported: {}",
                self.providers.llm,
                known_llm.join(", ")
            )));
        }

        let known_embedder = ["ollama", "openai", "mock"];
        if !known_embedder.contains(&self.providers.embedder.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedder provider: {}. Supported: {}",
                self.providers.embedder,
                known_embedder.join(", ")
            )));
        }

        let known_store = ["chroma", "memory"];
        if !known_store.contains(&self.providers.store.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown store provider: {}. Supported: {}",
                self.providers.store,
                known_store.join(", ")
            )));
        }

        if self.rag.distance.good_threshold >= self.rag.distance.weak_threshold {
            return Err(AppError::Config(format!(
                "distance.good_threshold ({}) must be below distance.weak_threshold ({})",
                self.rag.distance.good_threshold, self.rag.distance.weak_threshold
            )));
        }

        if self.rag.top_k == 0 {
            return Err(AppError::Config("rag.top_k must be at least 1".to_string()));
        }

        Ok(())
    }
}

/// Recursively merge mapping `b` into mapping `a`; `b` wins on conflicts.
fn deep_merge(a: serde_yaml::Value, b: serde_yaml::Value) -> serde_yaml::Value {
    match (a, b) {
        (serde_yaml::Value::Mapping(mut left), serde_yaml::Value::Mapping(right)) => {
            for (key, value) in right {
                let merged = match left.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                left.insert(key, merged);
            }
            serde_yaml::Value::Mapping(left)
        }
        (_, b) => b,
    }
}
