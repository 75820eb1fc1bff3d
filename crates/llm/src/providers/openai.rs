//! OpenAI-compatible chat completion provider (`/v1/chat/completions`).
//!
//! Works against OpenAI itself and any server exposing the same wire format.
//! Wire types stay private to this module.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default OpenAI endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Client for OpenAI-compatible chat completion endpoints.
pub struct OpenAiClient {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client; `endpoint` defaults to the public OpenAI API.
    pub fn new(
        endpoint: Option<&str>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.unwrap_or(DEFAULT_OPENAI_URL).to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn to_chat_request(&self, request: &LlmRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(Message {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(Message {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        ChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    fn convert_response(&self, response: ChatCompletionResponse) -> AppResult<LlmResponse> {
        let content = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AppError::Llm("Completion returned no choices".to_string()))?;

        let usage = response
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            model: response.model,
            usage,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(
            model = %request.model,
            prompt_len = request.prompt.len(),
            "Sending chat completion request"
        );

        let payload = self.to_chat_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send chat completion: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Chat completion API error ({}): {}",
                status, error_text
            )));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse chat completion: {}", e)))?;

        self.convert_response(body)
    }
}
