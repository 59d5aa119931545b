//! Error types for vecscope-core

use thiserror::Error;

/// Errors that can occur in the embedding and projection pipeline
#[derive(Debug, Error)]
pub enum VecscopeError {
    /// Model loading error. Terminal for the engine instance.
    #[error("Model error: {0}")]
    Model(String),

    /// Embedding generation error
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Operation invoked out of order
    #[error("State error: {0}")]
    State(String),

    /// Malformed input (empty text, shape mismatch, unknown algorithm)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The worker answered a request with an `error` response
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The worker is gone; the request can never be answered
    #[error("Transport error: {0}")]
    Transport(String),

    /// The worker answered with a response of the wrong kind
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl VecscopeError {
    /// Create a model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create an embedding error
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether this error means the session can no longer make progress.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Model(_) | Self::Transport(_))
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, VecscopeError>;
