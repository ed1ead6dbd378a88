//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Output sink error: {0}")]
    Sink(#[from] tickerflow_kafka::SinkError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] tickerflow_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task failure: {0}")]
    Task(String),
}

pub type AppResult<T> = Result<T, AppError>;
