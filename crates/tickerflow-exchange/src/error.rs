//! Exchange adapter error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("No subscription found for channel={channel}, symbol={symbol}")]
    SubscriptionNotFound { channel: String, symbol: String },

    #[error("Frame decode failed: {0}")]
    Decode(String),

    #[error("Unrecognized frame shape: {0}")]
    Unsupported(String),

    #[error("Volume lookup failed: {0}")]
    VolumeLookup(String),

    #[error("Aggregator channel closed")]
    ChannelClosed,

    #[error("WebSocket error: {0}")]
    Ws(#[from] tickerflow_ws::WsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;
