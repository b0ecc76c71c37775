//! Docs command handler.
//!
//! Lists the document store, or shows what a query would retrieve. Never
//! calls a model.

use chatloop_core::{AppConfig, AppResult};
use chatloop_knowledge::{ContextBuilder, DocumentStore, Retriever};
use clap::Args;

/// Inspect the document store and retrieval
#[derive(Args, Debug)]
pub struct DocsCommand {
    /// Query to retrieve documents for; lists all documents when omitted
    pub query: Option<String>,

    /// Maximum documents to retrieve
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DocsCommand {
    /// Execute the docs command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing docs command");

        let store = DocumentStore::sample();

        let Some(ref query) = self.query else {
            return self.list(&store);
        };

        let config = config.clone().with_chat_overrides(None, None, self.max_results);
        config.validate()?;

        let retriever = Retriever::new(config.chat.max_results);
        let retrieval = retriever.retrieve(query, &store);

        if self.json {
            let output = serde_json::json!({
                "query": query,
                "documents": retrieval.documents,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", ContextBuilder::new().build(&retrieval));
        }

        Ok(())
    }

    fn list(&self, store: &DocumentStore) -> AppResult<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(store.documents())?);
            return Ok(());
        }

        println!("{} documents:", store.len());
        for doc in store.documents() {
            println!("  {}  {}", doc.id, doc.title);
        }

        Ok(())
    }
}
