//! Typed settings handed to the agents, derived from [`AppConfig`].

use crate::retry::RetryPolicy;
use docqa_core::AppConfig;
use docqa_knowledge::RetrieverConfig;
use std::time::Duration;

/// Parameters for one kind of model call.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Budget for a single attempt
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            temperature: 0.2,
            max_tokens: 1000,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Pipeline behaviour.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Run the verification agent on the conversational endpoint
    pub require_verification: bool,
    pub retry: RetryPolicy,
    pub draft: GenerationSettings,
    pub verify: GenerationSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            require_verification: true,
            retry: RetryPolicy::default(),
            draft: GenerationSettings::default(),
            verify: GenerationSettings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        let settings = &config.pipeline;
        let generation = |timeout_secs: u64| GenerationSettings {
            model: config.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout: Duration::from_secs(timeout_secs),
        };

        Self {
            require_verification: settings.require_verification,
            retry: RetryPolicy::new(
                settings.max_retries,
                Duration::from_millis(settings.backoff_base_ms),
                Duration::from_millis(settings.backoff_max_ms),
            ),
            draft: generation(settings.draft_timeout_secs),
            verify: generation(settings.verify_timeout_secs),
        }
    }
}

/// Session store limits.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Prior turns prepended to each question
    pub history_window: usize,
    pub max_sessions: usize,
    /// Idle sessions older than this are removed by cleanup
    pub idle_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_window: 5,
            max_sessions: 100,
            idle_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl SessionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        let settings = &config.sessions;
        Self {
            history_window: settings.history_window,
            max_sessions: settings.max_sessions,
            idle_ttl: Duration::from_secs(settings.idle_ttl_hours.saturating_mul(60 * 60)),
        }
    }
}

/// Retriever settings from the application config.
pub fn retriever_config(config: &AppConfig) -> RetrieverConfig {
    RetrieverConfig::from_settings(&config.retrieval)
}
