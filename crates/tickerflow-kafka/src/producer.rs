//! Kafka producer for aggregated tickers.
//!
//! Publishes each aggregate as JSON onto the `romantic-aggregator` topic.
//! Delivery is at-most-once: publish failures are logged and the record
//! is dropped.

use crate::error::{SinkError, SinkResult};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;
use tickerflow_core::AggregatedTicker;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Topic every aggregate is published to.
pub const TOPIC_AGGREGATOR: &str = "romantic-aggregator";

/// Broker probe and publish timeout.
const KAFKA_TIMEOUT: Duration = Duration::from_secs(5);

/// Startup retry schedule: initial delay, doubling per attempt.
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(2);
const MAX_ATTEMPTS: u32 = 5;

/// Producer publishing aggregated tickers to Kafka.
pub struct TickerProducer {
    producer: FutureProducer,
}

impl TickerProducer {
    /// Build a producer against `addr` (`host:port`) and probe the broker.
    pub fn initialize(addr: &str) -> SinkResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", addr)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| SinkError::Config(e.to_string()))?;

        // The client connects lazily; fetch metadata so an unreachable
        // broker fails here instead of on the first publish.
        producer
            .client()
            .fetch_metadata(Some(TOPIC_AGGREGATOR), KAFKA_TIMEOUT)
            .map_err(|e| SinkError::Connect(e.to_string()))?;

        info!(%addr, topic = TOPIC_AGGREGATOR, "Kafka producer ready");
        Ok(Self { producer })
    }

    /// [`initialize`](Self::initialize) with retries: 2s initial delay,
    /// doubling, up to 5 attempts before giving up.
    pub async fn initialize_with_retry(addr: &str) -> SinkResult<Self> {
        let mut delay = INITIAL_RETRY_DELAY;
        let mut attempts_remaining = MAX_ATTEMPTS;

        loop {
            match Self::initialize(addr) {
                Ok(producer) => return Ok(producer),
                Err(e) => {
                    if attempts_remaining == 0 {
                        return Err(e);
                    }

                    warn!(
                        error = %e,
                        attempts_remaining,
                        retry_in_secs = delay.as_secs(),
                        "Kafka producer initialization failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempts_remaining -= 1;
                }
            }
        }
    }

    /// Consume the aggregate channel, publishing until it closes or
    /// shutdown is requested.
    pub async fn run(
        self,
        mut inbox: mpsc::Receiver<AggregatedTicker>,
        shutdown: CancellationToken,
    ) {
        let mut published = 0u64;
        let mut failed = 0u64;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                aggregate = inbox.recv() => match aggregate {
                    Some(ticker) => match self.publish(&ticker).await {
                        Ok(()) => published += 1,
                        Err(e) => {
                            warn!(symbol = %ticker.symbol, error = %e, "Publish failed, record dropped");
                            failed += 1;
                        }
                    },
                    None => break,
                },
            }
        }

        info!(published, failed, "Kafka producer stopped");
    }

    /// Publish one aggregate as JSON.
    pub async fn publish(&self, ticker: &AggregatedTicker) -> SinkResult<()> {
        let payload = serde_json::to_string(ticker)?;
        debug!(symbol = %ticker.symbol, "Publishing aggregate");

        self.producer
            .send(
                FutureRecord::<(), _>::to(TOPIC_AGGREGATOR).payload(&payload),
                Timeout::After(KAFKA_TIMEOUT),
            )
            .await
            .map_err(|(e, _)| SinkError::Publish(e.to_string()))?;

        Ok(())
    }
}
