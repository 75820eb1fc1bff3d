//! LLM provider factory.
//!
//! Resolves a provider name plus endpoint/secret settings into a shared
//! [`LlmClient`] trait object.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use docqa_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key (required by OpenAI-compatible endpoints)
/// * `timeout` - Transport-level timeout for each HTTP request
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown, a required secret
/// is missing, or the HTTP client cannot be built.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Duration,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    tracing::debug!(provider = provider_type.as_str(), ?endpoint, "Creating LLM client");

    match provider_type {
        ProviderType::Ollama => {
            let base_url = endpoint.unwrap_or(crate::providers::ollama::DEFAULT_OLLAMA_URL);
            let client = OllamaClient::with_timeout(base_url, timeout)?;
            Ok(Arc::new(client))
        }
        ProviderType::OpenAI => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("OpenAI provider requires API key".to_string())
            })?;
            let client = OpenAiClient::new(endpoint, api_key, timeout)?;
            Ok(Arc::new(client))
        }
    }
}
