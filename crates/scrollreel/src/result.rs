//! Result and error types for scrollreel.

use thiserror::Error;

/// Result type for recorder operations
pub type RecordResult<T> = Result<T, RecordError>;

/// Errors that can occur while recording a page
#[derive(Debug, Error)]
pub enum RecordError {
    /// A recording option failed validation
    #[error("Invalid option --{option}: {message}")]
    InvalidOption {
        /// Option name as spelled on the command line
        option: &'static str,
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Session (tab) could not be opened, configured or closed
    #[error("Browser session error: {message}")]
    Session {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Navigation did not finish inside the configured bound
    #[error("Navigation to {url} timed out after {secs}s")]
    NavigationTimeout {
        /// URL that timed out
        url: String,
        /// Timeout in seconds
        secs: u64,
    },

    /// Page-side script evaluation error
    #[error("Script evaluation failed: {message}")]
    Evaluation {
        /// Error message
        message: String,
    },

    /// The recording session closed without leaving a raw capture behind
    #[error("No raw capture found in {dir} after closing the recording session")]
    MissingCapture {
        /// Capture directory that was searched
        dir: String,
    },

    /// Raw capture could not be assembled
    #[error("Raw capture failed: {message}")]
    Capture {
        /// Error message
        message: String,
    },

    /// External encoder failed
    #[error("{tool} failed: {message}")]
    Encoder {
        /// Program that was run
        tool: String,
        /// Error message, including the tool's own stderr
        message: String,
    },

    /// Transcoding failed and the raw capture could not be kept either
    #[error("Transcode failed ({transcode}) and the raw capture could not be kept at {path}: {message}")]
    PreserveCapture {
        /// Where the raw capture was to be kept
        path: String,
        /// Why transcoding failed
        transcode: String,
        /// Why the copy failed
        message: String,
    },

    /// Video probing error
    #[error("Video probe failed: {message}")]
    Probe {
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

impl RecordError {
    /// Create an invalid option error
    #[must_use]
    pub fn invalid_option(option: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            option,
            message: message.into(),
        }
    }

    /// Create a session error
    #[must_use]
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Create a capture error
    #[must_use]
    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture {
            message: message.into(),
        }
    }

    /// Whether the error was raised before any browser or subprocess started
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidOption { .. })
    }
}
