//! Result and error types for Handset.

use thiserror::Error;

/// Result type for Handset operations
pub type HandsetResult<T> = Result<T, HandsetError>;

/// Errors that can occur in Handset
#[derive(Debug, Error)]
pub enum HandsetError {
    /// Platform selector outside {Android, iOS}
    #[error("Unsupported platform '{value}'. Expected one of: android, ios")]
    UnsupportedPlatform {
        /// The rejected selector
        value: String,
    },

    /// Malformed automation server address
    #[error("Invalid Appium endpoint '{endpoint}': {message}")]
    InvalidEndpoint {
        /// The configured endpoint
        endpoint: String,
        /// Error message
        message: String,
    },

    /// Handle-dependent operation with no handle for the context
    #[error("Driver not initialized for context '{context}'. Call create_handle first")]
    DriverNotInitialized {
        /// Context identifier
        context: String,
    },

    /// Application restart failed
    #[error("Failed to reset application: {source}")]
    ResetFailed {
        /// Underlying failure
        #[source]
        source: Box<HandsetError>,
    },

    /// Sending the application to background failed
    #[error("Failed to send application to background for {seconds}s: {source}")]
    BackgroundFailed {
        /// Requested duration
        seconds: i64,
        /// Underlying failure
        #[source]
        source: Box<HandsetError>,
    },

    /// Session could not be created
    #[error("Failed to create session: {message}")]
    SessionCreation {
        /// Error message
        message: String,
    },

    /// A WebDriver command failed
    #[error("WebDriver command '{command}' failed: {message}")]
    WebDriver {
        /// Command name
        command: String,
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Configuration source could not be parsed
    #[error("Failed to parse configuration file {path}: {message}")]
    ConfigParse {
        /// File path
        path: String,
        /// Error message
        message: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// Screen recording error
    #[error("Screen recording failed: {message}")]
    Recording {
        /// Error message
        message: String,
    },

    /// Report back-end error
    #[error("Report error: {message}")]
    Report {
        /// Error message
        message: String,
    },

    /// Scenario setup failed
    #[error("Setup of scenario '{scenario}' failed: {source}")]
    SetupFailed {
        /// Scenario display name
        scenario: String,
        /// Underlying failure
        #[source]
        source: Box<HandsetError>,
    },

    /// Suite setup failed
    #[error("Suite setup failed: {message}")]
    SuiteSetup {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HandsetError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a WebDriver command error
    #[must_use]
    pub fn webdriver(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WebDriver {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a driver-not-initialized error
    #[must_use]
    pub fn not_initialized(context: impl std::fmt::Display) -> Self {
        Self::DriverNotInitialized {
            context: context.to_string(),
        }
    }

    /// Create a report error
    #[must_use]
    pub fn report(message: impl Into<String>) -> Self {
        Self::Report {
            message: message.into(),
        }
    }

    /// Whether this error means no session exists for the context
    #[must_use]
    pub const fn is_not_initialized(&self) -> bool {
        matches!(self, Self::DriverNotInitialized { .. })
    }
}
