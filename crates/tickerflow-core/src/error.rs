//! Error types for tickerflow-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Currency code cannot be empty")]
    NotValid,

    #[error("Unknown currency pair: {0}-{1}")]
    NotFound(String, String),

    #[error("Unsupported emit interval: {0}")]
    UnsupportedInterval(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
