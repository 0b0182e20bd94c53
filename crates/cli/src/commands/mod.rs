//! Command handlers for the counsel CLI.

pub mod ask;
pub mod chat;
pub mod ingest;
pub mod stats;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use ingest::IngestCommand;
pub use stats::StatsCommand;
