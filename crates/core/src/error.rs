//! Error types for DocQA.
//!
//! This module defines a unified error enum that covers every failure
//! category of the answer pipeline: configuration, I/O, the external
//! retrieval and generation collaborators, prompts, and session lookups.

use thiserror::Error;

/// Unified error type for DocQA.
///
/// All fallible functions return `Result<T, AppError>`.
/// An empty retrieval result is not an error; it is handled as a policy
/// branch by the pipeline and yields a refusal answer.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single LLM provider call failed (transport, status, empty body)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Prompt loading and rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Corpus and index management errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// The context retriever is unreachable or misconfigured
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Draft or verification generation failed after exhausting retries
    #[error("Generation error: {0}")]
    Generation(String),

    /// A read operation referenced an unknown session
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Caller supplied an invalid argument (e.g. a blank question)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An external call exceeded its time budget
    #[error("Timed out after {seconds:.1}s: {operation}")]
    Timeout { operation: String, seconds: f64 },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the failure is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Llm(_) | AppError::Timeout { .. })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AppError::Llm("503".to_string()).is_retryable());
        assert!(AppError::Timeout {
            operation: "draft".to_string(),
            seconds: 1.0
        }
        .is_retryable());
        assert!(!AppError::Retrieval("down".to_string()).is_retryable());
        assert!(!AppError::Generation("gave up".to_string()).is_retryable());
        assert!(!AppError::SessionNotFound("abc".to_string()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = AppError::SessionNotFound("abc".to_string());
        assert_eq!(err.to_string(), "Session not found: abc");

        let err = AppError::Timeout {
            operation: "retrieval".to_string(),
            seconds: 2.5,
        };
        assert_eq!(err.to_string(), "Timed out after 2.5s: retrieval");
    }

    #[test]
    fn test_from_serde_json() {
        let err: AppError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
