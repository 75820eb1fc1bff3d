//! Ask command handler.
//!
//! One-off question answered by the draft agent alone. No session is kept
//! and the verification stage is skipped.

use super::format_sources;
use crate::wiring;
use clap::Args;
use docqa_core::{config::AppConfig, AppError, AppResult};

/// Answer one question from the corpus
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Number of fragments to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, mut config: AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        if let Some(top_k) = self.top_k {
            config.retrieval.top_k = top_k;
        }

        let service = wiring::qa_service(&config)?;
        let answer = service.answer_single_shot(&self.question).await?;

        if self.json {
            let json = serde_json::to_string_pretty(&answer)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            println!("{}", answer.final_answer);
            if !answer.fragments_used.is_empty() {
                println!("\nSources:\n{}", format_sources(&answer.fragments_used));
            }
        }

        Ok(())
    }
}
