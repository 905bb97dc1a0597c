//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Handset library error
    #[error("{0}")]
    Handset(#[from] handset::HandsetError),

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Output could not be rendered
    #[error("Failed to render output: {message}")]
    Render {
        /// Error message
        message: String,
    },

    /// Appium server answered but is not ready
    #[error("Appium server not ready: {message}")]
    ServerNotReady {
        /// Error message
        message: String,
    },

    /// The smoke scenario failed
    #[error("Smoke scenario failed: {message}")]
    SmokeFailed {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a render error
    #[must_use]
    pub fn render(message: impl std::fmt::Display) -> Self {
        Self::Render {
            message: message.to_string(),
        }
    }
}
