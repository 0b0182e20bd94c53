//! History-aware query rewriting.
//!
//! Short or context-dependent questions ("what about it?") retrieve poorly.
//! When the trigger rules fire and history exists, the LLM is asked once to
//! produce a self-contained query; anything suspicious about the result
//! falls back to the original question. Rewriting never raises on its own;
//! only a provider failure propagates.

use counsel_core::AppResult;
use counsel_llm::LlmClient;
use counsel_prompt::render_template;
use regex::{Regex, RegexSet};
use std::collections::HashMap;
use std::sync::Arc;

/// Doc-type tokens that make a short query self-specifying: no rewrite needed.
const EXPLICIT_TOKENS: [&str; 6] = ["moa", "aoa", "memo", "rule", "rules", "policy"];

const VAGUE_PATTERNS: [&str; 14] = [
    r"\bwhat about\b",
    r"\btell me about\b",
    r"\bcan you explain\b",
    r"\bcan you clarify\b",
    r"\bwhat does (it|this|that) mean\b",
    r"\bclarification\b",
    r"\bdoes that\b",
    r"\bdo they\b",
    r"\bexplain that\b",
    r"\bexpand on\b",
    r"\bwhy\b",
    r"\bhow about\b",
    r"\band\s*$",
    r"\btell me more\b",
];

const PRONOUN_PATTERN: &str = r"\b(it|this|that|they|them|he|she|his|her|its)\b";

/// Compiled trigger rules for `should_rewrite`.
pub struct RewriteRules {
    vague: RegexSet,
    pronouns: Regex,
}

impl Default for RewriteRules {
    fn default() -> Self {
        Self::new()
    }
}

impl RewriteRules {
    pub fn new() -> Self {
        Self {
            vague: RegexSet::new(VAGUE_PATTERNS).expect("vague patterns are valid"),
            pronouns: Regex::new(PRONOUN_PATTERN).expect("pronoun pattern is valid"),
        }
    }

    /// Does this question need disambiguation from history?
    ///
    /// True when any of:
    /// - word count <= `max_words` and no explicit doc-type token;
    /// - a vague-reference pattern matches;
    /// - a pronoun appears as a standalone word.
    pub fn should_rewrite(&self, question: &str, max_words: usize) -> bool {
        let q = question.trim().to_lowercase();
        if q.is_empty() {
            return false;
        }

        if q.split_whitespace().count() <= max_words
            && !EXPLICIT_TOKENS.iter().any(|tok| q.contains(tok))
        {
            return true;
        }

        if self.vague.is_match(&q) {
            return true;
        }

        self.pronouns.is_match(&q)
    }
}

#[derive(Debug, Clone)]
pub struct QueryRewriterConfig {
    pub enabled: bool,
    pub trigger_max_words: usize,
    pub max_rewrite_chars: usize,
}

/// Decides whether a question needs rewriting and performs the rewrite.
pub struct QueryRewriter {
    llm: Arc<dyn LlmClient>,
    template: String,
    cfg: QueryRewriterConfig,
    rules: RewriteRules,
}

impl QueryRewriter {
    pub fn new(llm: Arc<dyn LlmClient>, rewrite_template: &str, cfg: QueryRewriterConfig) -> Self {
        Self {
            llm,
            template: rewrite_template.trim().to_string(),
            cfg,
            rules: RewriteRules::new(),
        }
    }

    /// Return a self-contained retrieval query for `question`.
    ///
    /// The fast path (rewriting disabled, no trigger, or blank history)
    /// returns the question unchanged with zero generation calls. A
    /// triggered rewrite keeps only the first line of the model output and
    /// falls back to the original question when the result is empty or
    /// longer than `max_rewrite_chars`.
    pub async fn maybe_rewrite(&self, question: &str, history_text: &str) -> AppResult<String> {
        if !self.cfg.enabled {
            return Ok(question.to_string());
        }
        if !self
            .rules
            .should_rewrite(question, self.cfg.trigger_max_words)
        {
            return Ok(question.to_string());
        }
        if history_text.trim().is_empty() {
            return Ok(question.to_string());
        }

        let mut vars = HashMap::new();
        vars.insert("history".to_string(), history_text.to_string());
        vars.insert("question".to_string(), question.to_string());
        let prompt = render_template(&self.template, &vars)?;

        let raw = self.llm.generate(&prompt).await?;
        let rewritten = raw.lines().next().unwrap_or("").trim();

        if rewritten.is_empty() {
            tracing::debug!("Rewrite produced no text, keeping original question");
            return Ok(question.to_string());
        }
        if rewritten.chars().count() > self.cfg.max_rewrite_chars {
            tracing::debug!("Rewrite exceeded length cap, keeping original question");
            return Ok(question.to_string());
        }

        tracing::debug!(original = %question, rewritten = %rewritten, "Rewrote query");
        Ok(rewritten.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use counsel_core::{AppError, AppResult};
    use counsel_llm::TokenStream;
    use std::sync::Mutex;

    /// LLM stub returning a scripted answer and counting calls.
    #[derive(Debug)]
    struct ScriptedLlm {
        answer: String,
        calls: Mutex<usize>,
    }

    impl ScriptedLlm {
        fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlm {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _prompt: &str) -> AppResult<String> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.answer.clone())
        }

        async fn generate_stream(&self, _prompt: &str) -> AppResult<TokenStream> {
            Err(AppError::Provider("not used in rewrite tests".to_string()))
        }
    }

    fn rewriter(llm: Arc<ScriptedLlm>) -> QueryRewriter {
        QueryRewriter::new(
            llm,
            "History:\n{{history}}\nQuestion: {{question}}",
            QueryRewriterConfig {
                enabled: true,
                trigger_max_words: 8,
                max_rewrite_chars: 300,
            },
        )
    }

    #[test]
    fn test_should_rewrite_vague() {
        let rules = RewriteRules::new();
        assert!(rules.should_rewrite("why", 8));
        assert!(rules.should_rewrite("what about it?", 8));
        assert!(rules.should_rewrite("tell me more about the onboarding process please", 8));
    }

    #[test]
    fn test_should_not_rewrite_specific_question() {
        let rules = RewriteRules::new();
        assert!(!rules.should_rewrite("what is the MOA deadline for travel reimbursement", 8));
        assert!(!rules.should_rewrite("", 8));
    }

    #[test]
    fn test_should_not_rewrite_short_with_doc_type() {
        let rules = RewriteRules::new();
        assert!(!rules.should_rewrite("summarize the memo", 8));
        assert!(!rules.should_rewrite("aoa filing date", 8));
    }

    #[test]
    fn test_pronoun_triggers_rewrite() {
        let rules = RewriteRules::new();
        assert!(rules.should_rewrite(
            "considering the previous conversation we had earlier can you summarize what they decided",
            8
        ));
    }

    #[tokio::test]
    async fn test_fast_path_makes_no_llm_call() {
        let llm = Arc::new(ScriptedLlm::new("unused"));
        let rewriter = rewriter(llm.clone());

        // no trigger
        let out = rewriter
            .maybe_rewrite("what is the MOA deadline for travel reimbursement", "User: hi")
            .await
            .unwrap();
        assert_eq!(out, "what is the MOA deadline for travel reimbursement");

        // trigger, but empty history
        let out = rewriter.maybe_rewrite("why", "   ").await.unwrap();
        assert_eq!(out, "why");

        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rewrite_keeps_first_line() {
        let llm = Arc::new(ScriptedLlm::new(
            "What is the travel reimbursement deadline?\nSecond line noise",
        ));
        let rewriter = rewriter(llm.clone());

        let out = rewriter
            .maybe_rewrite("what about it?", "User: travel reimbursement")
            .await
            .unwrap();
        assert_eq!(out, "What is the travel reimbursement deadline?");
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_rewrite_falls_back() {
        let llm = Arc::new(ScriptedLlm::new("   \n"));
        let rewriter = rewriter(llm);

        let out = rewriter
            .maybe_rewrite("what about it?", "User: travel")
            .await
            .unwrap();
        assert_eq!(out, "what about it?");
    }

    #[tokio::test]
    async fn test_oversized_rewrite_falls_back() {
        let llm = Arc::new(ScriptedLlm::new(&"x".repeat(500)));
        let rewriter = rewriter(llm);

        let out = rewriter
            .maybe_rewrite("what about it?", "User: travel")
            .await
            .unwrap();
        assert_eq!(out, "what about it?");
    }

    #[tokio::test]
    async fn test_disabled_rewriter_passes_through() {
        let llm = Arc::new(ScriptedLlm::new("unused"));
        let rewriter = QueryRewriter::new(
            llm.clone(),
            "{{question}}",
            QueryRewriterConfig {
                enabled: false,
                trigger_max_words: 8,
                max_rewrite_chars: 300,
            },
        );

        let out = rewriter.maybe_rewrite("why", "User: hi").await.unwrap();
        assert_eq!(out, "why");
        assert_eq!(llm.call_count(), 0);
    }
}
