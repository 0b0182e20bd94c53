//! Closing-remark detection.
//!
//! Decides whether an incoming message ends the conversation ("thanks,
//! that's all") or is a real query. Two rule gates run before the embedding
//! check, so an obvious question can never be classified as a closing and a
//! message without an explicit closing phrase never reaches the embedding
//! step.

use crate::embeddings::{cosine_similarity, Embedder};
use counsel_core::AppResult;
use regex::Regex;
use std::sync::Arc;

/// Minimum similarity to the closing anchor.
const CLOSING_SIM_FLOOR: f32 = 0.35;

/// Required margin of closing similarity over question similarity.
const CLOSING_SIM_MARGIN: f32 = 0.05;

const QUESTION_ANCHOR_TEXTS: [&str; 3] = [
    "User asks a question about the documents.",
    "User wants an answer or explanation.",
    "User asks for clarification or a follow-up.",
];

const CLOSING_ANCHOR_TEXTS: [&str; 3] = [
    "User says thank you.",
    "User says goodbye.",
    "User is done and ends the conversation.",
];

pub struct IntentClassifier {
    embedder: Arc<dyn Embedder>,
    question_cues: Regex,
    closing_phrases: Regex,
    question_anchor: Vec<f32>,
    closing_anchor: Vec<f32>,
}

impl IntentClassifier {
    /// Build the classifier, embedding the anchor exemplars once.
    pub async fn build(embedder: Arc<dyn Embedder>) -> AppResult<Self> {
        let question_cues = Regex::new(
            r"(?i)(\?)|^(who|what|when|where|why|how|can|could|would|should|do|does|did|is|are|am|will|may)\b",
        )
        .expect("question cue pattern is valid");

        let closing_phrases = Regex::new(
            r"(?i)\b(thanks|thank you|thx|bye|goodbye|that's all|thats all|done|all good|no more|nothing else|no worries)\b",
        )
        .expect("closing phrase pattern is valid");

        let question_anchor = Self::anchor(embedder.as_ref(), &QUESTION_ANCHOR_TEXTS).await?;
        let closing_anchor = Self::anchor(embedder.as_ref(), &CLOSING_ANCHOR_TEXTS).await?;

        Ok(Self {
            embedder,
            question_cues,
            closing_phrases,
            question_anchor,
            closing_anchor,
        })
    }

    /// Mean embedding of the exemplar sentences.
    async fn anchor(embedder: &dyn Embedder, texts: &[&str]) -> AppResult<Vec<f32>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(embedder.embed_one(text).await?);
        }

        let dim = vectors.first().map(Vec::len).unwrap_or(0);
        let mut mean = vec![0.0f32; dim];
        for vector in &vectors {
            for (m, v) in mean.iter_mut().zip(vector) {
                *m += v;
            }
        }
        let n = vectors.len() as f32;
        for m in &mut mean {
            *m /= n;
        }
        Ok(mean)
    }

    /// Is this message a closing remark rather than a query?
    ///
    /// Costs one embedding call, and only when both rule gates pass.
    pub async fn is_closing(&self, text: &str) -> AppResult<bool> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(true);
        }

        // Hard guard: questions are never closings.
        if self.question_cues.is_match(text) {
            return Ok(false);
        }

        // Hard guard: only close on an explicit closing phrase. Keeps
        // "ok but ..." style replies in the conversation.
        if !self.closing_phrases.is_match(text) {
            return Ok(false);
        }

        // Embedding confirmation with an absolute floor and a margin.
        let vector = self.embedder.embed_one(text).await?;
        let sim_closing = cosine_similarity(&vector, &self.closing_anchor);
        let sim_question = cosine_similarity(&vector, &self.question_anchor);

        Ok(sim_closing > CLOSING_SIM_FLOOR && (sim_closing - sim_question) > CLOSING_SIM_MARGIN)
    }
}
