//! Mock embedding provider with deterministic, content-aware vectors.

use crate::embeddings::Embedder;
use counsel_core::AppResult;
use std::collections::{HashMap, HashSet};

/// Deterministic embedder for tests and offline development.
///
/// Hashes word and character-trigram features into a fixed number of
/// dimensions. Not semantically meaningful like a real model, but similar
/// texts land near each other, which is enough to exercise retrieval.
#[derive(Debug)]
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        let stop_words: HashSet<&str> = [
            "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to",
            "of", "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have",
            "has", "had", "it", "its", "their", "they", "them",
        ]
        .into_iter()
        .collect();

        let lower = text.to_lowercase();
        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split_whitespace()
            .filter(|w| w.len() > 2 && !stop_words.contains(w))
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let hash = window
                    .iter()
                    .flat_map(|c| c.to_string().into_bytes())
                    .fold(0u64, |acc, b| acc.wrapping_mul(37).wrapping_add(b as u64));
                embedding[(hash as usize) % self.dimensions] += (*freq as f32).sqrt();
            }

            let word_hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            embedding[(word_hash as usize) % self.dimensions] += *freq as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl Embedder for MockEmbedder {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}
