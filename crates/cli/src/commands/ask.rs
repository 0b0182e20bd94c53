//! Ask command handler.
//!
//! One-shot question answering, either as a complete response or as a
//! token-by-token stream.

use clap::Args;
use counsel_core::types::{ChatEvent, ChatResponse, Citation};
use counsel_core::{AppResult, Settings};
use counsel_rag::create_rag_service;
use futures::StreamExt;
use std::io::Write;

/// Ask a single question against the knowledge base
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Stream tokens as they are generated
    #[arg(long)]
    pub stream: bool,

    /// Output the response as JSON
    #[arg(long, conflicts_with = "stream")]
    pub json: bool,

    /// Session identifier for log correlation
    #[arg(long)]
    pub session_id: Option<String>,
}

impl AskCommand {
    pub async fn execute(&self, settings: &Settings) -> AppResult<()> {
        let service = create_rag_service(settings).await?;

        if self.stream {
            let mut events = service.chat_stream(
                self.question.clone(),
                Vec::new(),
                self.session_id.clone(),
            );

            let mut citations: Vec<Citation> = Vec::new();
            while let Some(event) = events.next().await {
                match event? {
                    ChatEvent::Token { t } => {
                        print!("{}", t);
                        std::io::stdout().flush().ok();
                    }
                    ChatEvent::Citations { citations: used } => citations = used,
                    ChatEvent::Done {} => break,
                }
            }
            println!();
            print_citations(&citations);
            return Ok(());
        }

        let (answer, citations) = service
            .chat(&self.question, &[], self.session_id.as_deref())
            .await?;

        if self.json {
            let response = ChatResponse { answer, citations };
            let json = serde_json::to_string_pretty(&response)
                .map_err(|e| counsel_core::AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            println!("{}", answer);
            print_citations(&citations);
        }

        Ok(())
    }
}

/// Print a human-readable source list after the answer.
pub(crate) fn print_citations(citations: &[Citation]) {
    if citations.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for (i, citation) in citations.iter().enumerate() {
        let page = citation
            .page
            .map(|p| format!(", page {}", p))
            .unwrap_or_default();
        let doc_type = citation
            .doc_type
            .as_deref()
            .map(|d| format!(" [{}]", d))
            .unwrap_or_default();
        println!("  {}. {}{}{}", i + 1, citation.source, page, doc_type);
    }
}
