//! Logging infrastructure for DocQA.
//!
//! Logs go to stderr so that answers printed on stdout stay pipeable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Default filter when neither `RUST_LOG` nor an explicit level is given.
const DEFAULT_FILTER: &str = "info";

/// Initialize the tracing subscriber with stderr output.
///
/// # Arguments
/// * `log_level` - Optional filter override (e.g., "debug", "docqa_agents=trace")
/// * `no_color` - Disable ANSI colors
///
/// # Example
/// ```no_run
/// use docqa_core::logging::init_logging;
///
/// init_logging(Some("debug"), true).expect("Failed to initialize logging");
/// ```
pub fn init_logging(log_level: Option<&str>, no_color: bool) -> AppResult<()> {
    let filter_str = resolve_filter(log_level, std::env::var("RUST_LOG").ok());

    let env_filter = EnvFilter::try_new(&filter_str)
        .map_err(|e| AppError::Config(format!("Invalid log filter '{}': {}", filter_str, e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(!no_color && std::env::var_os("NO_COLOR").is_none());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))?;

    Ok(())
}

/// Pick the effective filter: explicit level, then `RUST_LOG`, then the default.
fn resolve_filter(log_level: Option<&str>, rust_log: Option<String>) -> String {
    log_level
        .map(str::to_string)
        .or(rust_log)
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}
