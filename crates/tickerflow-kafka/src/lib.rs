//! Output sink: Kafka publishing of aggregated tickers.

pub mod error;
pub mod producer;

pub use error::{SinkError, SinkResult};
pub use producer::{TickerProducer, TOPIC_AGGREGATOR};
