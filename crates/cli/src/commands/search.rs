//! Search command handler.
//!
//! Runs only the context retriever, which is handy for tuning `minScore`
//! and `topK` against a corpus.

use super::format_sources;
use crate::wiring;
use clap::Args;
use docqa_agents::config::retriever_config;
use docqa_core::{config::AppConfig, AppError, AppResult};
use docqa_knowledge::ContextRetriever;

/// Show what the retriever returns for a query
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// Number of fragments to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");

        let retriever = ContextRetriever::new(wiring::search_index(&config)?, retriever_config(&config));
        let top_k = self.top_k.unwrap_or(retriever.config().top_k);
        let fragments = retriever.retrieve(&self.query, top_k).await?;

        if self.json {
            let output = serde_json::json!({
                "query": self.query,
                "topK": top_k,
                "minScore": retriever.config().min_score,
                "fragments": fragments,
            });
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else if fragments.is_empty() {
            println!(
                "No fragment scored above {:.2}",
                retriever.config().min_score
            );
        } else {
            println!("{}", format_sources(&fragments));
        }

        Ok(())
    }
}
