//! Generation collaborator for DocQA.
//!
//! This crate provides a provider-agnostic abstraction for text completion.
//! The draft and verification agents only see the [`LlmClient`] trait, so the
//! concrete provider can be swapped without touching pipeline logic.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI-compatible**: `/v1/chat/completions` endpoints
//!
//! # Example
//! ```no_run
//! use docqa_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use types::ProviderType;
