//! DocQA CLI
//!
//! Main entry point for the docqa command-line tool.
//! Answers questions about a document corpus with a retrieve, draft and
//! verify agent pipeline.

mod commands;
mod wiring;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand, SearchCommand};
use docqa_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// DocQA - grounded question answering over your documents
#[derive(Parser, Debug)]
#[command(name = "docqa")]
#[command(about = "Grounded question answering over a document corpus", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCQA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "DOCQA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama, openai)
    #[arg(short, long, global = true, env = "DOCQA_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "DOCQA_MODEL")]
    model: Option<String>,

    /// Pre-chunked JSONL corpus to answer from
    #[arg(long, global = true, env = "DOCQA_CORPUS")]
    corpus: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer one question from the corpus (draft only)
    Ask(AskCommand),

    /// Conversational session with verified answers
    Chat(ChatCommand),

    /// Show what the retriever returns for a query
    Search(SearchCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.corpus,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)
        .context("Failed to initialize logging")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!("DocQA CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
        Commands::Search(_) => "search",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result.with_context(|| format!("docqa {} failed", command_name))
}
