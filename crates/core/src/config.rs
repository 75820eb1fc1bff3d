//! Configuration management for DocQA.
//!
//! Configuration is merged from several sources, later ones winning:
//! - Built-in defaults
//! - Config file (`.docqa/config.yaml` in the workspace, or `DOCQA_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! The YAML file carries provider settings plus the retrieval, pipeline and
//! session tuning knobs consumed by the agents crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "openai"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docqa/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider ("ollama", "openai")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Context retriever settings
    pub retrieval: RetrievalSettings,

    /// Agent pipeline settings
    pub pipeline: PipelineSettings,

    /// Session store settings
    pub sessions: SessionSettings,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAI { model, .. } | ProviderConfig::Ollama { model, .. } => model,
        }
    }

    /// Custom endpoint, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::OpenAI { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// Context retriever settings (`retrieval:` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    /// Number of fragments requested per query
    pub top_k: usize,

    /// Fragments scoring below this are discarded
    pub min_score: f32,

    /// Pre-chunked JSONL corpus, relative paths resolve against the workspace
    pub corpus: Option<PathBuf>,

    /// Budget for a single retriever call
    pub timeout_secs: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            min_score: 0.20,
            corpus: None,
            timeout_secs: 10,
        }
    }
}

/// Agent pipeline settings (`pipeline:` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    /// Run the verification stage on the conversational endpoint
    pub require_verification: bool,

    /// Attempts per generation call (first try included)
    pub max_retries: u32,

    /// First backoff delay
    pub backoff_base_ms: u64,

    /// Backoff ceiling
    pub backoff_max_ms: u64,

    /// Budget for a single draft call
    pub draft_timeout_secs: u64,

    /// Budget for a single verification call
    pub verify_timeout_secs: u64,

    /// Sampling temperature for both agents
    pub temperature: f32,

    /// Completion length cap for both agents
    pub max_tokens: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            require_verification: true,
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 4000,
            draft_timeout_secs: 60,
            verify_timeout_secs: 60,
            temperature: 0.2,
            max_tokens: 1000,
        }
    }
}

/// Session store settings (`sessions:` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Prior turns prepended to a conversational question
    pub history_window: usize,

    /// Sessions kept in memory before idle ones are evicted
    pub max_sessions: usize,

    /// Idle sessions older than this are removed by cleanup
    pub idle_ttl_hours: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            history_window: 5,
            max_sessions: 100,
            idle_ttl_hours: 24,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    retrieval: Option<RetrievalSettings>,
    pipeline: Option<PipelineSettings>,
    sessions: Option<SessionSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            retrieval: RetrievalSettings::default(),
            pipeline: PipelineSettings::default(),
            sessions: SessionSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and the environment.
    ///
    /// Environment variables:
    /// - `DOCQA_WORKSPACE`: Override workspace path
    /// - `DOCQA_CONFIG`: Path to config file
    /// - `DOCQA_PROVIDER`: LLM provider
    /// - `DOCQA_MODEL`: Model identifier
    /// - `DOCQA_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use docqa_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("DOCQA_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("DOCQA_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.docqa_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("DOCQA_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("DOCQA_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("DOCQA_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        Ok(self.merge_file(config_file))
    }

    fn merge_file(&self, config_file: ConfigFile) -> Self {
        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();
            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }
            result.llm = Some(llm);
        }

        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }
        if let Some(sessions) = config_file.sessions {
            result.sessions = sessions;
        }

        result
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        corpus: Option<PathBuf>,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if let Some(corpus) = corpus {
            self.retrieval.corpus = Some(corpus);
        }

        self
    }

    /// Get the path to the .docqa directory.
    pub fn docqa_dir(&self) -> PathBuf {
        self.workspace.join(".docqa")
    }

    /// Resolve the corpus path against the workspace.
    pub fn corpus_path(&self) -> Option<PathBuf> {
        self.retrieval.corpus.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.workspace.join(p)
            }
        })
    }

    /// Get the configuration of a named provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Resolve the API key for a provider.
    ///
    /// `DOCQA_API_KEY` wins over the provider's `apiKeyEnv` variable.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenAI { api_key_env, .. }) => std::env::var(api_key_env).ok(),
            _ => None,
        }
    }

    /// Validate provider names and numeric ranges.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if let Some(ProviderConfig::OpenAI { api_key_env, .. }) =
            self.get_provider_config(&self.provider)
        {
            if self.api_key.is_none() && std::env::var(api_key_env).is_err() {
                return Err(AppError::Config(format!(
                    "API key not found in environment variable: {}",
                    api_key_env
                )));
            }
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config("retrieval.topK must be at least 1".to_string()));
        }

        if self.pipeline.max_retries == 0 {
            return Err(AppError::Config(
                "pipeline.maxRetries must be at least 1".to_string(),
            ));
        }

        if self.pipeline.backoff_base_ms > self.pipeline.backoff_max_ms {
            return Err(AppError::Config(format!(
                "pipeline.backoffBaseMs ({}) exceeds pipeline.backoffMaxMs ({})",
                self.pipeline.backoff_base_ms, self.pipeline.backoff_max_ms
            )));
        }

        if self.sessions.max_sessions == 0 {
            return Err(AppError::Config(
                "sessions.maxSessions must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
