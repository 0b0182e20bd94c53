//! Vector retrieval with dedup, rerank and citation building.

use crate::embeddings::Embedder;
use crate::store::{DocFilter, Metadata, VectorStore};
use counsel_core::types::Citation;
use counsel_core::AppResult;
use std::collections::HashSet;
use std::sync::Arc;

/// Maximum snippet length in a citation.
const MAX_SNIPPET_CHARS: usize = 160;

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub top_k: usize,
    pub retrieval_pool_k: usize,
}

/// A retrieval outcome: three co-indexed sequences ordered by ascending
/// distance (most relevant first). Downstream packing and citation
/// numbering both depend on this order.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub documents: Vec<String>,
    pub citations: Vec<Citation>,
    pub distances: Vec<f32>,
}

struct Hit {
    id: String,
    document: String,
    metadata: Option<Metadata>,
    distance: f32,
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    cfg: RetrieverConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        cfg: RetrieverConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            cfg,
        }
    }

    /// Retrieve up to `top_k` passages for the question.
    ///
    /// Fetches a candidate pool, sorts it by distance (stable, so store
    /// order breaks ties), keeps one passage per (source, page) pair, then
    /// backfills with duplicates if the unique picks fall short of `top_k`.
    pub async fn retrieve(
        &self,
        question: &str,
        filter: Option<&DocFilter>,
    ) -> AppResult<Retrieval> {
        let query_vec = self.embedder.embed_one(question).await?;
        let pool_k = self.cfg.retrieval_pool_k.max(self.cfg.top_k);

        let result = self
            .store
            .query(&[query_vec], pool_k, filter)
            .await?;

        let ids = result.ids.into_iter().next().unwrap_or_default();
        if ids.is_empty() {
            return Ok(Retrieval::default());
        }
        let documents = result.documents.into_iter().next().unwrap_or_default();
        let metadatas = result.metadatas.into_iter().next().unwrap_or_default();
        let distances = result.distances.into_iter().next().unwrap_or_default();

        let mut hits: Vec<Hit> = ids
            .into_iter()
            .zip(documents)
            .zip(metadatas.into_iter().chain(std::iter::repeat(None)))
            .zip(distances)
            .map(|(((id, document), metadata), distance)| Hit {
                id,
                document,
                metadata,
                distance,
            })
            .collect();

        // Rerank locally; sort is stable so equal distances keep store order.
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        let top_k = self.cfg.top_k;
        let mut picked: Vec<usize> = Vec::with_capacity(top_k);
        let mut seen: HashSet<(String, Option<String>)> = HashSet::new();

        for (i, hit) in hits.iter().enumerate() {
            if !seen.insert(dedup_key(hit)) {
                continue;
            }
            picked.push(i);
            if picked.len() >= top_k {
                break;
            }
        }

        // Backfill with remaining candidates (duplicate source/page allowed)
        // so the caller still receives top_k items when the pool has them.
        if picked.len() < top_k {
            let chosen: HashSet<usize> = picked.iter().copied().collect();
            for i in 0..hits.len() {
                if chosen.contains(&i) {
                    continue;
                }
                picked.push(i);
                if picked.len() >= top_k {
                    break;
                }
            }
        }

        let mut retrieval = Retrieval::default();
        for &i in &picked {
            let hit = &hits[i];
            retrieval.documents.push(hit.document.clone());
            retrieval.citations.push(build_citation(hit));
            retrieval.distances.push(hit.distance);
        }

        tracing::debug!(
            pool = hits.len(),
            kept = retrieval.documents.len(),
            "Retrieved passages"
        );

        Ok(retrieval)
    }
}

fn dedup_key(hit: &Hit) -> (String, Option<String>) {
    let meta = hit.metadata.as_ref();
    let source = meta
        .and_then(|m| m.get("source"))
        .map(stringify)
        .unwrap_or_else(|| "unknown".to_string());
    let page = meta.and_then(|m| m.get("page")).map(stringify);
    (source, page)
}

/// Render a metadata value the way it reads, without JSON string quoting.
fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn build_citation(hit: &Hit) -> Citation {
    let meta = hit.metadata.as_ref();

    let source = meta
        .and_then(|m| m.get("source"))
        .filter(|v| !v.is_null())
        .map(stringify)
        .unwrap_or_else(|| "unknown".to_string());

    let doc_type = meta
        .and_then(|m| m.get("doc_type"))
        .filter(|v| !v.is_null())
        .map(stringify);

    // Best-effort integer cast; anything unparseable becomes None.
    let page = meta.and_then(|m| m.get("page")).and_then(|v| {
        v.as_i64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
    });

    let collapsed = hit.document.replace('\n', " ");
    let collapsed = collapsed.trim();
    let snippet = if collapsed.is_empty() {
        None
    } else if collapsed.chars().count() > MAX_SNIPPET_CHARS {
        let truncated: String = collapsed.chars().take(MAX_SNIPPET_CHARS).collect();
        Some(format!("{}...", truncated))
    } else {
        Some(collapsed.to_string())
    };

    Citation {
        source,
        doc_type,
        page,
        chunk_id: Some(hit.id.clone()),
        snippet,
    }
}
