//! Error types for casegen.

use thiserror::Error;

/// Result type alias using casegen's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for casegen operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A probed external dependency (binary, model, service) is missing
    #[error("Tool unavailable: {0}")]
    ToolUnavailable(String),

    /// An external dependency ran but exited abnormally or produced malformed output
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// Invalid input (missing, unreadable or empty video)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request conflicts with the current resource state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workspace allocation, permission or other failure the pipeline cannot degrade around
    #[error("Unrecoverable error: {0}")]
    Unrecoverable(String),

    /// A newer analysis job owns the asset; this job's outcome is discarded
    #[error("Superseded: {0}")]
    Superseded(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the strategy selector should fall through to the next candidate.
    pub fn is_fallthrough(&self) -> bool {
        matches!(
            self,
            Error::ToolUnavailable(_)
                | Error::ToolExecution(_)
                | Error::Inference(_)
                | Error::Request(_)
                | Error::Serialization(_)
        )
    }

    /// Whether the error is the caller's fault (maps to a 4xx response).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_) | Error::NotFound(_) | Error::Conflict(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
