//! Error types for keel.

use thiserror::Error;

/// The main error type for keel operations.
#[derive(Debug, Error)]
pub enum KeelError {
    /// The backend could not be reached or rejected the credentials.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement was malformed or the backend refused to execute it.
    #[error("Query error: {0}")]
    Query(String),

    /// A positionally-keyed sequence was supplied where a keyed mapping was required.
    #[error("Array error: {0}")]
    Array(String),

    /// A model precondition (primary key, stored instance) did not hold.
    #[error("Model error: {0}")]
    Model(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to parse a textual condition.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KeelError {
    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }

    /// Create a model error.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }
}

/// Result type alias for keel operations.
pub type KeelResult<T> = Result<T, KeelError>;
