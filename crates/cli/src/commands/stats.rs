//! Stats command handler.

use clap::Args;
use counsel_core::{AppResult, Settings};
use counsel_rag::create_store;

/// Show knowledge base statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, settings: &Settings) -> AppResult<()> {
        let store = create_store(settings).await?;
        let count = store.count().await?;

        if self.json {
            let output = serde_json::json!({
                "collection": settings.rag.collection_name,
                "count": count,
                "store": settings.providers.store,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Collection: {}", settings.rag.collection_name);
            println!("Store:      {}", settings.providers.store);
            println!("Passages:   {}", count);
        }

        Ok(())
    }
}
