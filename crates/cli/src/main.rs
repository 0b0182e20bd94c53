//! Counsel CLI
//!
//! Main entry point for the counsel command-line tool: citation-backed
//! question answering over a private PDF knowledge base.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand, IngestCommand, StatsCommand};
use counsel_core::{config::Settings, logging, AppResult};
use std::path::PathBuf;

/// Counsel CLI - ask questions against a private document knowledge base
#[derive(Parser, Debug)]
#[command(name = "counsel")]
#[command(about = "Citation-backed RAG chat over a private knowledge base", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration directory (default: ./configs)
    #[arg(short, long, global = true, env = "COUNSEL_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a single question
    Ask(AskCommand),

    /// Interactive multi-turn chat session
    Chat(ChatCommand),

    /// Ingest PDF documents into the vector store
    Ingest(IngestCommand),

    /// Show knowledge base statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config_dir.as_deref())?;
    settings.validate()?;

    let log_level = if cli.verbose {
        Some("debug")
    } else {
        cli.log_level.as_deref()
    };
    logging::init_logging(
        log_level.or(Some(settings.app.log_level.as_str())),
        cli.no_color,
    )?;

    tracing::info!(
        app = %settings.app.app_name,
        llm = %settings.providers.llm,
        embedder = %settings.providers.embedder,
        store = %settings.providers.store,
        "Counsel CLI starting"
    );

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
        Commands::Ingest(_) => "ingest",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&settings).await,
        Commands::Chat(cmd) => cmd.execute(&settings).await,
        Commands::Ingest(cmd) => cmd.execute(&settings).await,
        Commands::Stats(cmd) => cmd.execute(&settings).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
