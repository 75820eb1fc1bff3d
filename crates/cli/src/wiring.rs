//! Builds the LLM client, search index and QA service from configuration.

use docqa_agents::QaService;
use docqa_core::{config::AppConfig, AppError, AppResult};
use docqa_knowledge::{MemoryIndex, SearchIndex};
use docqa_llm::{create_client, LlmClient};
use std::sync::Arc;
use std::time::Duration;

/// Create the configured LLM client.
///
/// The transport timeout covers the slower of the two agent budgets; each
/// agent still enforces its own per-attempt timeout.
pub fn llm_client(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let endpoint = config
        .get_provider_config(&config.provider)
        .and_then(|pc| pc.endpoint());
    let api_key = config.resolve_api_key(&config.provider);
    let timeout_secs = config
        .pipeline
        .draft_timeout_secs
        .max(config.pipeline.verify_timeout_secs);

    create_client(
        &config.provider,
        endpoint,
        api_key.as_deref(),
        Duration::from_secs(timeout_secs),
    )
}

/// Load the corpus into an in-memory index.
pub fn search_index(config: &AppConfig) -> AppResult<Arc<dyn SearchIndex>> {
    let path = config.corpus_path().ok_or_else(|| {
        AppError::Config(
            "No corpus configured. Set retrieval.corpus in .docqa/config.yaml or pass --corpus"
                .to_string(),
        )
    })?;

    let index = MemoryIndex::from_jsonl(&path)?;
    tracing::info!(corpus = %path.display(), fragments = index.len(), "Corpus loaded");

    if index.is_empty() {
        tracing::warn!("Corpus is empty, every question will be refused");
    }

    Ok(Arc::new(index))
}

/// Wire the full service.
pub fn qa_service(config: &AppConfig) -> AppResult<QaService> {
    let index = search_index(config)?;
    let llm = llm_client(config)?;
    tracing::debug!(provider = llm.provider_name(), backend = index.backend_name(), "Service wired");

    QaService::from_config(config, llm, index)
}
