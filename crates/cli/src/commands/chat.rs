//! Interactive chat command handler.
//!
//! Multi-turn REPL over stdin. History lives in memory for the session and
//! feeds query rewriting and prompt assembly; closing remarks get the fixed
//! acknowledgement from the pipeline.

use crate::commands::ask::print_citations;
use clap::Args;
use counsel_core::types::ChatTurn;
use counsel_core::{AppResult, Settings};
use counsel_rag::create_rag_service;
use std::io::{BufRead, Write};

/// Start an interactive chat session
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Session identifier for log correlation
    #[arg(long)]
    pub session_id: Option<String>,
}

impl ChatCommand {
    pub async fn execute(&self, settings: &Settings) -> AppResult<()> {
        let service = create_rag_service(settings).await?;
        let mut history: Vec<ChatTurn> = Vec::new();

        println!("{} - type 'exit' to quit", settings.app.app_name);

        let stdin = std::io::stdin();
        loop {
            print!("you> ");
            std::io::stdout().flush().ok();

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let message = line.trim();
            if message.is_empty() {
                continue;
            }
            if message == "exit" || message == "quit" {
                break;
            }

            let (answer, citations) = service
                .chat(message, &history, self.session_id.as_deref())
                .await?;

            println!("{}", answer);
            print_citations(&citations);
            println!();

            history.push(ChatTurn::user(message));
            history.push(ChatTurn::assistant(answer));
        }

        Ok(())
    }
}
