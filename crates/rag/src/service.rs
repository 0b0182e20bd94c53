//! RAG orchestration.
//!
//! Sequences the pipeline (classify, rewrite, route, retrieve, gate, pack,
//! build), applies the deny/weak/strong confidence policy, and exposes three
//! modes: build-prompt-only, synchronous chat, and a streaming event
//! surface.

use crate::intent::IntentClassifier;
use crate::packer::{ContextPacker, ContextPackerConfig};
use crate::retriever::{Retriever, RetrieverConfig};
use crate::rewrite::{QueryRewriter, QueryRewriterConfig};
use crate::router::route_filter;
use crate::{embeddings::Embedder, store::VectorStore};
use counsel_core::types::{ChatEvent, ChatTurn, Citation, Role};
use counsel_core::{AppResult, Settings};
use counsel_llm::LlmClient;
use counsel_prompt::{PromptBuilder, PromptBundle};
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use regex::Regex;
use std::pin::Pin;
use std::sync::Arc;

/// At most this many citations are surfaced with a streamed answer.
const MAX_USED_CITATIONS: usize = 3;

/// Only the most recent user turns feed the pipeline.
const MAX_USER_HISTORY_TURNS: usize = 4;

/// Case-insensitive refusal markers; candidates are lower-cased before the
/// contains check, so every entry must be lower-case.
const REFUSAL_TRIGGERS: [&str; 13] = [
    "i couldn't find",
    "i could not find",
    "i can't find",
    "i cannot find",
    "not in the provided context",
    "provided context does not contain",
    "context does not contain",
    "based on the provided context",
    "i don't have enough information",
    "i do not have enough information",
    "i apologize",
    "unable to answer",
    "could you please provide",
];

/// Stream of chat events: tokens, then optionally citations, then done.
pub type ChatEventStream = Pin<Box<dyn Stream<Item = AppResult<ChatEvent>> + Send>>;

enum Prepared {
    /// Closing remark: acknowledge, no retrieval.
    Closing,
    /// No usable evidence: respond with the deny message.
    Deny,
    Ready {
        prompt: String,
        citations: Vec<Citation>,
    },
}

/// The pipeline coordinator.
///
/// Built once at the composition root from explicitly injected providers;
/// immutable and shareable across concurrent requests.
pub struct RagService {
    llm: Arc<dyn LlmClient>,
    intent: IntentClassifier,
    rewriter: QueryRewriter,
    retriever: Retriever,
    packer: ContextPacker,
    builder: PromptBuilder,
    cite_marker: Regex,

    good_threshold: f32,
    weak_threshold: f32,
    max_history: usize,
    rewrite_max_history_turns: usize,
    require_quotes_in_weak_mode: bool,
    deny_message: String,
    closing_message: String,
}

impl RagService {
    /// Wire the pipeline components together. Embeds the intent anchors, so
    /// this makes a handful of embedding calls up front.
    pub async fn build(
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LlmClient>,
        store: Arc<dyn VectorStore>,
        prompts: PromptBundle,
        settings: &Settings,
    ) -> AppResult<Self> {
        let intent = IntentClassifier::build(Arc::clone(&embedder)).await?;

        let rewriter = QueryRewriter::new(
            Arc::clone(&llm),
            &prompts.rewrite,
            QueryRewriterConfig {
                enabled: settings.rag.rewrite.enabled,
                trigger_max_words: settings.rag.rewrite.trigger_max_words,
                max_rewrite_chars: settings.rag.rewrite.max_rewrite_chars,
            },
        );

        let retriever = Retriever::new(
            Arc::clone(&embedder),
            store,
            RetrieverConfig {
                top_k: settings.rag.top_k,
                retrieval_pool_k: settings.rag.retrieval_pool_k,
            },
        );

        let packer = ContextPacker::new(ContextPackerConfig {
            max_context_chars: settings.rag.max_context_chars,
            max_chunks_in_prompt: settings.rag.max_chunks_in_prompt,
        });

        let builder = PromptBuilder::new(&prompts);

        Ok(Self {
            llm,
            intent,
            rewriter,
            retriever,
            packer,
            builder,
            cite_marker: Regex::new(r"\[(\d{1,3})\]").expect("citation pattern is valid"),
            good_threshold: settings.rag.distance.good_threshold,
            weak_threshold: settings.rag.distance.weak_threshold,
            max_history: settings.rag.max_history,
            rewrite_max_history_turns: settings.rag.rewrite.max_history_turns,
            require_quotes_in_weak_mode: settings.policy.require_quotes_in_weak_mode,
            deny_message: settings.policy.deny_message.clone(),
            closing_message: settings.policy.closing_message.clone(),
        })
    }

    pub fn deny_message(&self) -> &str {
        &self.deny_message
    }

    /// Shared pipeline up to the assembled prompt.
    ///
    /// `numbered` controls context numbering: the build/stream path numbers
    /// documents `[i] text` so the model's bracket markers align with the
    /// 1-based citation list; the full-chat path packs plain text.
    async fn prepare(
        &self,
        question: &str,
        history: &[ChatTurn],
        session_id: Option<&str>,
        numbered: bool,
    ) -> AppResult<Prepared> {
        if self.intent.is_closing(question).await? {
            tracing::info!(session_id, "Closing remark, short-circuiting");
            return Ok(Prepared::Closing);
        }

        let history = user_only_history(history);

        let rewrite_history =
            PromptBuilder::format_history(&history, self.rewrite_max_history_turns);
        let retrieve_question = self.rewriter.maybe_rewrite(question, &rewrite_history).await?;

        let filter = route_filter(&retrieve_question);
        let retrieval = self
            .retriever
            .retrieve(&retrieve_question, filter.as_ref())
            .await?;

        if retrieval.documents.is_empty() {
            return Ok(Prepared::Deny);
        }

        let best = match retrieval.distances.first() {
            Some(d) => *d,
            None => return Ok(Prepared::Deny),
        };
        if best > self.weak_threshold {
            tracing::info!(best_distance = best, session_id, "Best match too distant, denying");
            return Ok(Prepared::Deny);
        }
        let weak = best > self.good_threshold;

        tracing::info!(
            best_distance = best,
            weak,
            question,
            session_id,
            "Answering from retrieved context"
        );

        let history_text = PromptBuilder::format_history(&history, self.max_history);

        let docs: Vec<String> = if numbered {
            retrieval
                .documents
                .iter()
                .enumerate()
                .map(|(i, d)| format!("[{}] {}", i + 1, d))
                .collect()
        } else {
            retrieval.documents.clone()
        };
        let context = self.packer.pack(&docs);

        let prompt = self.builder.build(
            &history_text,
            &context,
            question,
            weak,
            self.require_quotes_in_weak_mode,
        )?;

        Ok(Prepared::Ready {
            prompt,
            citations: retrieval.citations,
        })
    }

    /// Build-only mode: assemble the prompt and citation list without
    /// calling the generation provider.
    ///
    /// Returns `(prompt, citations, deny_text)`; exactly one of `prompt` and
    /// `deny_text` is Some. The citation list is the full retrieval list;
    /// selection against the generated answer is the caller's step, via
    /// [`select_used_citations`](Self::select_used_citations).
    pub async fn build_prompt_and_citations(
        &self,
        question: &str,
        history: &[ChatTurn],
        session_id: Option<&str>,
    ) -> AppResult<(Option<String>, Vec<Citation>, Option<String>)> {
        match self.prepare(question, history, session_id, true).await? {
            Prepared::Closing => Ok((None, Vec::new(), Some(self.closing_message.clone()))),
            Prepared::Deny => Ok((None, Vec::new(), Some(self.deny_message.clone()))),
            Prepared::Ready { prompt, citations } => Ok((Some(prompt), citations, None)),
        }
    }

    /// Full mode: run the pipeline and generate synchronously.
    ///
    /// The answer comes back verbatim with the unfiltered citation list;
    /// context is packed without numbering, so bracket-based selection does
    /// not apply here.
    pub async fn chat(
        &self,
        question: &str,
        history: &[ChatTurn],
        session_id: Option<&str>,
    ) -> AppResult<(String, Vec<Citation>)> {
        match self.prepare(question, history, session_id, false).await? {
            Prepared::Closing => Ok((self.closing_message.clone(), Vec::new())),
            Prepared::Deny => Ok((self.deny_message.clone(), Vec::new())),
            Prepared::Ready { prompt, citations } => {
                let answer = self.llm.generate(&prompt).await?;
                Ok((answer, citations))
            }
        }
    }

    /// Streaming mode: an ordered event sequence of zero or more tokens,
    /// at most one citations payload (suppressed on deny and on a
    /// refusal-worded answer), then exactly one done marker.
    ///
    /// Dropping the returned stream cancels generation at the next token
    /// boundary.
    pub fn chat_stream(
        self: Arc<Self>,
        question: String,
        history: Vec<ChatTurn>,
        session_id: Option<String>,
    ) -> ChatEventStream {
        let (tx, rx) = mpsc::unbounded();

        tokio::spawn(async move {
            let result = self
                .stream_events(&question, &history, session_id.as_deref(), &tx)
                .await;
            if let Err(e) = result {
                let _ = tx.unbounded_send(Err(e));
            }
        });

        Box::pin(rx)
    }

    async fn stream_events(
        &self,
        question: &str,
        history: &[ChatTurn],
        session_id: Option<&str>,
        tx: &mpsc::UnboundedSender<AppResult<ChatEvent>>,
    ) -> AppResult<()> {
        let send = |event: ChatEvent| tx.unbounded_send(Ok(event)).is_ok();

        let (prompt, citations, deny_text) = self
            .build_prompt_and_citations(question, history, session_id)
            .await?;

        let prompt = match prompt {
            Some(prompt) => prompt,
            None => {
                // Deny path: emit the deny text word-by-word as synthetic
                // tokens, then finish. No citations.
                if let Some(text) = deny_text {
                    for word in text.split_whitespace() {
                        if !send(ChatEvent::Token {
                            t: format!("{} ", word),
                        }) {
                            return Ok(());
                        }
                    }
                }
                send(ChatEvent::Done {});
                return Ok(());
            }
        };

        let mut stream = self.llm.generate_stream(&prompt).await?;
        let mut answer = String::new();

        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            if fragment.is_empty() {
                continue;
            }
            answer.push_str(&fragment);
            if !send(ChatEvent::Token { t: fragment }) {
                return Ok(());
            }
        }

        // Re-check the reconstructed answer; a refusal suppresses citations.
        if !self.is_refusal(&answer) {
            let used = self.select_used_citations(&answer, &citations, MAX_USED_CITATIONS);
            if !send(ChatEvent::Citations { citations: used }) {
                return Ok(());
            }
        }

        send(ChatEvent::Done {});
        Ok(())
    }

    /// Keep only the citations the answer actually references.
    ///
    /// Scans for bracket markers `[n]`, maps unique markers in order of
    /// first appearance to the 1-based citation list, and falls back to the
    /// first `max_used` citations when no valid marker is present. Every
    /// path returns a concrete (possibly empty) list.
    pub fn select_used_citations(
        &self,
        answer: &str,
        citations: &[Citation],
        max_used: usize,
    ) -> Vec<Citation> {
        if citations.is_empty() {
            return Vec::new();
        }
        if answer.trim().is_empty() {
            return citations.iter().take(max_used).cloned().collect();
        }

        let mut seen = std::collections::HashSet::new();
        let mut used = Vec::new();
        for caps in self.cite_marker.captures_iter(answer) {
            let n: usize = match caps[1].parse() {
                Ok(n) => n,
                Err(_) => continue,
            };
            if !seen.insert(n) {
                continue;
            }
            if n >= 1 && n <= citations.len() {
                used.push(citations[n - 1].clone());
            }
        }

        if used.is_empty() {
            return citations.iter().take(max_used).cloned().collect();
        }
        used.truncate(max_used);
        used
    }

    /// Is this answer (or deny text) refusal-worded?
    ///
    /// Checked only against generated or deny text, never against the
    /// outbound prompt: the prompt legitimately embeds the refusal sentence
    /// inside the weak-mode instructions.
    pub fn is_refusal(&self, answer: &str) -> bool {
        let a = answer.trim().to_lowercase();
        if a.is_empty() {
            return true;
        }
        REFUSAL_TRIGGERS.iter().any(|t| a.contains(t))
    }
}

/// Keep only user-authored turns, at most the last `MAX_USER_HISTORY_TURNS`.
/// Turns with a missing/empty text are dropped later, at formatting time.
fn user_only_history(history: &[ChatTurn]) -> Vec<ChatTurn> {
    let user_turns: Vec<ChatTurn> = history
        .iter()
        .filter(|t| t.role == Role::User)
        .cloned()
        .collect();
    let start = user_turns.len().saturating_sub(MAX_USER_HISTORY_TURNS);
    user_turns[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::mock::MockEmbedder;
    use crate::store::{DocFilter, Metadata, QueryResult, VectorStore};
    use counsel_llm::TokenStream;

    const DENY: &str = "I couldn't find relevant information in the knowledge base.";

    /// LLM stub: fixed answer for both modes, streamed in small fragments.
    #[derive(Debug)]
    struct ScriptedLlm {
        answer: String,
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlm {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _prompt: &str) -> AppResult<String> {
            Ok(self.answer.clone())
        }

        async fn generate_stream(&self, _prompt: &str) -> AppResult<TokenStream> {
            let fragments: Vec<AppResult<String>> = self
                .answer
                .split_inclusive(' ')
                .map(|s| Ok(s.to_string()))
                .collect();
            Ok(Box::pin(futures::stream::iter(fragments)))
        }
    }

    /// Store stub returning one fixed hit at a fixed distance.
    struct SingleHitStore {
        distance: f32,
    }

    #[async_trait::async_trait]
    impl VectorStore for SingleHitStore {
        async fn upsert(
            &self,
            _ids: &[String],
            _documents: &[String],
            _embeddings: &[Vec<f32>],
            _metadatas: &[Metadata],
        ) -> AppResult<()> {
            Ok(())
        }

        async fn query(
            &self,
            _query_embeddings: &[Vec<f32>],
            _n_results: usize,
            _filter: Option<&DocFilter>,
        ) -> AppResult<QueryResult> {
            let mut meta = Metadata::new();
            meta.insert("source".to_string(), serde_json::json!("handbook.pdf"));
            meta.insert("doc_type".to_string(), serde_json::json!("rule"));
            meta.insert("page".to_string(), serde_json::json!(2));
            Ok(QueryResult {
                ids: vec![vec!["handbook.pdf::p2::c0".to_string()]],
                documents: vec![vec![
                    "Travel reimbursement requests are due within thirty days.".to_string(),
                ]],
                metadatas: vec![vec![Some(meta)]],
                distances: vec![vec![self.distance]],
            })
        }

        async fn count(&self) -> AppResult<usize> {
            Ok(1)
        }
    }

    /// Store stub with no content at all.
    struct EmptyStore;

    #[async_trait::async_trait]
    impl VectorStore for EmptyStore {
        async fn upsert(
            &self,
            _ids: &[String],
            _documents: &[String],
            _embeddings: &[Vec<f32>],
            _metadatas: &[Metadata],
        ) -> AppResult<()> {
            Ok(())
        }

        async fn query(
            &self,
            _query_embeddings: &[Vec<f32>],
            _n_results: usize,
            _filter: Option<&DocFilter>,
        ) -> AppResult<QueryResult> {
            Ok(QueryResult::default())
        }

        async fn count(&self) -> AppResult<usize> {
            Ok(0)
        }
    }

    fn bundle() -> PromptBundle {
        PromptBundle {
            system: "Answer from the reference information only. {{weak_rules}}".to_string(),
            answer:
                "History:\n{{history}}\n\nContext:\n{{context}}\n\nQuestion: {{question}}{{weak_answer_format}}"
                    .to_string(),
            rewrite: "History:\n{{history}}\nRewrite: {{question}}".to_string(),
        }
    }

    async fn service_with(store: Arc<dyn VectorStore>, answer: &str) -> Arc<RagService> {
        let settings = Settings::default();
        Arc::new(
            RagService::build(
                Arc::new(MockEmbedder::new(128)),
                Arc::new(ScriptedLlm {
                    answer: answer.to_string(),
                }),
                store,
                bundle(),
                &settings,
            )
            .await
            .unwrap(),
        )
    }

    fn sample_citations(n: usize) -> Vec<Citation> {
        (0..n)
            .map(|i| Citation {
                source: format!("doc{}.pdf", i + 1),
                doc_type: Some("memo".to_string()),
                page: Some(i as i64 + 1),
                chunk_id: Some(format!("c{}", i + 1)),
                snippet: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_no_hits_denies_both_modes() {
        let service = service_with(Arc::new(EmptyStore), "unused").await;

        let (prompt, citations, deny) = service
            .build_prompt_and_citations("what is the travel deadline?", &[], None)
            .await
            .unwrap();
        assert!(prompt.is_none());
        assert!(citations.is_empty());
        assert_eq!(deny.as_deref(), Some(DENY));

        let (answer, citations) = service
            .chat("what is the travel deadline?", &[], None)
            .await
            .unwrap();
        assert_eq!(answer, DENY);
        assert!(citations.is_empty());
    }

    #[tokio::test]
    async fn test_distant_best_match_denies() {
        let service = service_with(Arc::new(SingleHitStore { distance: 0.9 }), "unused").await;

        let (prompt, _, deny) = service
            .build_prompt_and_citations("what is the travel deadline?", &[], None)
            .await
            .unwrap();
        assert!(prompt.is_none());
        assert_eq!(deny.as_deref(), Some(DENY));
    }

    #[tokio::test]
    async fn test_weak_distance_adds_quote_requirement() {
        // good_threshold 0.40 < 0.5 <= weak_threshold 0.55
        let service = service_with(Arc::new(SingleHitStore { distance: 0.5 }), "unused").await;

        let (prompt, citations, deny) = service
            .build_prompt_and_citations("what is the travel deadline?", &[], None)
            .await
            .unwrap();
        let prompt = prompt.unwrap();
        assert!(deny.is_none());
        assert_eq!(citations.len(), 1);
        assert!(prompt.contains("verbatim quote"));
        assert!(prompt.contains("Support/Citation"));
        // build mode numbers the packed context
        assert!(prompt.contains("[1] Travel reimbursement"));
    }

    #[tokio::test]
    async fn test_strong_distance_omits_quote_requirement() {
        let service = service_with(Arc::new(SingleHitStore { distance: 0.3 }), "unused").await;

        let (prompt, _, _) = service
            .build_prompt_and_citations("what is the travel deadline?", &[], None)
            .await
            .unwrap();
        assert!(!prompt.unwrap().contains("verbatim quote"));
    }

    #[tokio::test]
    async fn test_full_chat_returns_answer_with_unfiltered_citations() {
        let service = service_with(
            Arc::new(SingleHitStore { distance: 0.3 }),
            "Thirty days. [2]",
        )
        .await;

        let history = vec![
            ChatTurn::user("tell me about reimbursement"),
            ChatTurn::assistant("it is in the handbook"),
        ];
        let (answer, citations) = service
            .chat("what about it?", &history, Some("s1"))
            .await
            .unwrap();

        // answer verbatim, citations unfiltered (full mode does no
        // bracket-based selection)
        assert_eq!(answer, "Thirty days. [2]");
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].source, "handbook.pdf");
    }

    #[tokio::test]
    async fn test_closing_short_circuits() {
        let service = service_with(Arc::new(EmptyStore), "unused").await;

        let (answer, citations) = service
            .chat("thank you. goodbye.", &[], None)
            .await
            .unwrap();
        assert!(answer.starts_with("No problem"));
        assert!(citations.is_empty());
    }

    #[tokio::test]
    async fn test_select_used_citations_round_trip() {
        let service = service_with(Arc::new(EmptyStore), "unused").await;
        let citations = sample_citations(3);

        let used = service.select_used_citations("the answer is here [2]", &citations, 3);
        assert_eq!(used.len(), 1);
        assert_eq!(used[0], citations[1]);
    }

    #[tokio::test]
    async fn test_select_used_citations_fallback_and_caps() {
        let service = service_with(Arc::new(EmptyStore), "unused").await;
        let citations = sample_citations(5);

        // no markers: first three
        let used = service.select_used_citations("plain answer", &citations, 3);
        assert_eq!(used.len(), 3);
        assert_eq!(used[0], citations[0]);

        // out-of-range markers only: fallback as well
        let used = service.select_used_citations("see [9]", &citations, 3);
        assert_eq!(used.len(), 3);

        // duplicates collapse, order of first appearance, capped at 3
        let used =
            service.select_used_citations("[4] then [1] again [4] then [2] and [3]", &citations, 3);
        assert_eq!(used[0], citations[3]);
        assert_eq!(used[1], citations[0]);
        assert_eq!(used.len(), 3);

        // empty citation list always yields an empty list
        let used = service.select_used_citations("anything [1]", &[], 3);
        assert!(used.is_empty());
    }

    #[tokio::test]
    async fn test_is_refusal() {
        let service = service_with(Arc::new(EmptyStore), "unused").await;
        assert!(service.is_refusal(""));
        assert!(service.is_refusal("   "));
        assert!(service.is_refusal("I couldn't find that anywhere."));
        assert!(service.is_refusal("I Don't Have Enough Information to answer."));
        assert!(!service.is_refusal("The deadline is thirty days."));
    }

    #[tokio::test]
    async fn test_stream_deny_path_token_order() {
        let service = service_with(Arc::new(EmptyStore), "unused").await;

        let events: Vec<ChatEvent> = service
            .chat_stream("what is the travel deadline?".to_string(), vec![], None)
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert!(events.len() > 1);
        let mut reconstructed = String::new();
        for event in &events[..events.len() - 1] {
            match event {
                ChatEvent::Token { t } => reconstructed.push_str(t),
                other => panic!("unexpected event before done: {:?}", other),
            }
        }
        assert_eq!(reconstructed.trim(), DENY);
        assert!(matches!(events.last(), Some(ChatEvent::Done {})));
    }

    #[tokio::test]
    async fn test_stream_answer_path_event_order() {
        let service = service_with(
            Arc::new(SingleHitStore { distance: 0.3 }),
            "Thirty days per the handbook. [1]",
        )
        .await;

        let events: Vec<ChatEvent> = service
            .chat_stream("what is the travel deadline?".to_string(), vec![], None)
            .map(|e| e.unwrap())
            .collect()
            .await;

        // all tokens, then one citations payload, then done
        let mut answer = String::new();
        let mut citation_batches = 0;
        for (i, event) in events.iter().enumerate() {
            match event {
                ChatEvent::Token { t } => {
                    assert_eq!(citation_batches, 0, "token after citations");
                    answer.push_str(t);
                }
                ChatEvent::Citations { citations } => {
                    citation_batches += 1;
                    assert_eq!(citations.len(), 1);
                    assert_eq!(citations[0].source, "handbook.pdf");
                }
                ChatEvent::Done {} => assert_eq!(i, events.len() - 1),
            }
        }
        assert_eq!(citation_batches, 1);
        assert_eq!(answer, "Thirty days per the handbook. [1]");
    }

    #[tokio::test]
    async fn test_stream_refusal_suppresses_citations() {
        let service = service_with(
            Arc::new(SingleHitStore { distance: 0.3 }),
            "I couldn't find that in the provided context.",
        )
        .await;

        let events: Vec<ChatEvent> = service
            .chat_stream("what is the travel deadline?".to_string(), vec![], None)
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert!(events
            .iter()
            .all(|e| !matches!(e, ChatEvent::Citations { .. })));
        assert!(matches!(events.last(), Some(ChatEvent::Done {})));
    }

    #[test]
    fn test_user_only_history_window() {
        let history = vec![
            ChatTurn::user("one"),
            ChatTurn::assistant("a"),
            ChatTurn::user("two"),
            ChatTurn::user("three"),
            ChatTurn::assistant("b"),
            ChatTurn::user("four"),
            ChatTurn::user("five"),
        ];
        let kept = user_only_history(&history);
        assert_eq!(kept.len(), 4);
        assert!(kept.iter().all(|t| t.role == Role::User));
        assert_eq!(kept[0].text, "two");
        assert_eq!(kept[3].text, "five");
    }
}
