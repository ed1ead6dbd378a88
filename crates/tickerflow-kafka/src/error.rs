//! Output sink error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Producer configuration failed: {0}")]
    Config(String),

    #[error("Broker unreachable: {0}")]
    Connect(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SinkResult<T> = Result<T, SinkError>;
