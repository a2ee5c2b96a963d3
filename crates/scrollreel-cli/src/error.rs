//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Async runtime or logging could not be set up
    #[error("Runtime error: {message}")]
    Runtime {
        /// Error message
        message: String,
    },

    /// Recording failed
    #[error("{0}")]
    Record(#[from] scrollreel::RecordError),

    /// Summary serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Create a runtime error
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Whether the error was caught before anything was launched
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        match self {
            Self::Record(e) => e.is_validation(),
            _ => false,
        }
    }
}
