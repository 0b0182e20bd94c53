//! Retrieval-augmented answering for the counsel service.
//!
//! Answers natural-language questions against a private document corpus by
//! retrieving relevant passages and constraining a language model to answer
//! only from them, refusing when the evidence is insufficient.
//!
//! The pipeline: intent classification (closing remark vs. real query),
//! history-aware query rewriting, keyword routing to a document category,
//! vector retrieval with dedup and rerank, context packing under size
//! budgets, a deny/weak/strong confidence policy, prompt assembly, and
//! citation selection.

pub mod embeddings;
pub mod ingest;
pub mod intent;
pub mod packer;
pub mod retriever;
pub mod rewrite;
pub mod router;
pub mod service;
pub mod store;

pub use embeddings::{create_embedder, Embedder};
pub use intent::IntentClassifier;
pub use retriever::{Retrieval, Retriever, RetrieverConfig};
pub use rewrite::{QueryRewriter, RewriteRules};
pub use router::route_filter;
pub use service::{ChatEventStream, RagService};
pub use store::{create_store, DocFilter, VectorStore};

use counsel_core::{AppResult, Settings};
use counsel_prompt::PromptStore;
use std::sync::Arc;

/// Composition root: build a fully wired [`RagService`] from settings.
///
/// All providers are constructed here, explicitly, and injected down; there
/// is no global memoization. Unsupported providers and missing prompt
/// templates fail fast before any request is served.
pub async fn create_rag_service(settings: &Settings) -> AppResult<Arc<RagService>> {
    settings.validate()?;

    let embedder = embeddings::create_embedder(settings)?;
    let llm = counsel_llm::create_llm(settings)?;
    let store = store::create_store(settings).await?;
    let prompts = PromptStore::new(&settings.app.prompts_dir).load(false)?;

    let service = RagService::build(embedder, llm, store, prompts, settings).await?;
    Ok(Arc::new(service))
}
