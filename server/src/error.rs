//! Error types for the vecscope server.

use thiserror::Error;
use vecscope_core::VecscopeError;

/// Errors that can occur in the server and CLI.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] VecscopeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ServerError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ServerError::Config(_) => 2,
            _ => 1,
        }
    }
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
