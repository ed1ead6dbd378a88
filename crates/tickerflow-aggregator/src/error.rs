//! Aggregator error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("Aggregator command channel closed")]
    CommandChannelClosed,
}

pub type AggregatorResult<T> = Result<T, AggregatorError>;
