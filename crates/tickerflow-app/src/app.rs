//! Application orchestration.
//!
//! Wires the pipeline together and supervises shutdown:
//! Kafka producer (with startup retry) → aggregator → fetcher group →
//! control-plane server. SIGINT fans out through cancellation tokens:
//! the fetcher group interrupts each adapter (the proxies send close
//! frames), and the aggregator, producer, and API stop on their tokens.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use std::sync::Arc;
use tickerflow_aggregator::Aggregator;
use tickerflow_api::ApiState;
use tickerflow_exchange::FetcherGroup;
use tickerflow_kafka::TickerProducer;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Queue sizes between pipeline stages.
const TICKER_QUEUE: usize = 1024;
const AGGREGATE_QUEUE: usize = 256;

/// Main application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline until SIGINT or a fatal server error.
    pub async fn run(self) -> AppResult<()> {
        let shutdown = CancellationToken::new();

        // Output sink first: with no broker there is nowhere to publish.
        let producer = TickerProducer::initialize_with_retry(&self.config.kafka_address).await?;

        let (ticker_tx, ticker_rx) = mpsc::channel(TICKER_QUEUE);
        let (aggregate_tx, aggregate_rx) = mpsc::channel(AGGREGATE_QUEUE);

        let (aggregator, aggregator_handle) =
            Aggregator::new(ticker_rx, aggregate_tx, shutdown.child_token());

        let group = Arc::new(FetcherGroup::initialize(ticker_tx).await);
        if group.is_empty() {
            warn!("No exchange adapter is available; the pipeline will stay idle");
        }

        let producer_task = tokio::spawn(producer.run(aggregate_rx, shutdown.child_token()));
        let aggregator_task = tokio::spawn(aggregator.run());
        let group_task = {
            let group = group.clone();
            tokio::spawn(async move { group.start().await })
        };

        let api_state = ApiState::new(group.clone(), aggregator_handle);
        let mut api_task = tokio::spawn(tickerflow_api::serve(
            api_state,
            self.config.api_port,
            shutdown.child_token(),
        ));

        info!(api_port = self.config.api_port, "Pipeline running");

        let mut fatal: Option<AppError> = None;
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("SIGINT received, shutting down"),
                    Err(e) => error!(error = %e, "Signal listener failed, shutting down"),
                }
            }
            result = &mut api_task => {
                match result {
                    Ok(Ok(())) => warn!("Control-plane server stopped"),
                    Ok(Err(e)) => {
                        error!(error = %e, "Control-plane server failed");
                        fatal = Some(e.into());
                    }
                    Err(e) => {
                        error!(error = %e, "Control-plane task panicked");
                        fatal = Some(AppError::Task(e.to_string()));
                    }
                }
            }
        }

        // Fan the interrupt out: adapters first, then everything else.
        group.stop();
        shutdown.cancel();

        let _ = group_task.await;
        let _ = aggregator_task.await;
        let _ = producer_task.await;
        if !api_task.is_finished() {
            if let Ok(Err(e)) = api_task.await {
                error!(error = %e, "Control-plane server error");
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => {
                info!("Shutdown complete");
                Ok(())
            }
        }
    }
}
