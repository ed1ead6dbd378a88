//! Fetcher group: fans subscription commands across every adapter and
//! supervises their lifetimes.

use crate::bitfinex::{BitfinexAdapter, BITFINEX_WS_URL};
use crate::error::{ExchangeError, ExchangeResult};
use crate::gdax::{GdaxAdapter, GDAX_REST_URL, GDAX_WS_URL};
use crate::SubscriptionAction;
use std::sync::Arc;
use tickerflow_core::{CurrencyPair, SimpleTicker};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// One exchange adapter. The set is closed, so dispatch is an enum match.
#[derive(Clone)]
pub enum Adapter {
    Gdax(Arc<GdaxAdapter>),
    Bitfinex(Arc<BitfinexAdapter>),
}

impl Adapter {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gdax(_) => "GDAX",
            Self::Bitfinex(_) => "Bitfinex",
        }
    }

    pub async fn start(&self) -> ExchangeResult<()> {
        match self {
            Self::Gdax(a) => a.start().await,
            Self::Bitfinex(a) => a.start().await,
        }
    }

    pub async fn new_message(
        &self,
        action: SubscriptionAction,
        symbols: &[String],
        channels: &[String],
    ) -> ExchangeResult<()> {
        match self {
            Self::Gdax(a) => a.new_message(action, symbols, channels).await,
            Self::Bitfinex(a) => a.new_message(action, symbols, channels).await,
        }
    }

    pub fn translate_currency(&self, pairs: &[CurrencyPair]) -> Vec<String> {
        match self {
            Self::Gdax(a) => a.translate_currency(pairs),
            Self::Bitfinex(a) => a.translate_currency(pairs),
        }
    }

    pub fn interrupt(&self) {
        match self {
            Self::Gdax(a) => a.interrupt(),
            Self::Bitfinex(a) => a.interrupt(),
        }
    }
}

/// The set of healthy adapters, keyed by construction.
pub struct FetcherGroup {
    adapters: Vec<Adapter>,
}

impl FetcherGroup {
    /// Construct and initialize every known adapter against the live
    /// exchange endpoints. Adapters whose initialization fails are
    /// excluded; the others continue.
    pub async fn initialize(aggregator_tx: mpsc::Sender<SimpleTicker>) -> Self {
        Self::initialize_with_urls(
            GDAX_WS_URL,
            GDAX_REST_URL,
            BITFINEX_WS_URL,
            aggregator_tx,
        )
        .await
    }

    /// Construct against specific endpoints.
    pub async fn initialize_with_urls(
        gdax_ws_url: &str,
        gdax_rest_url: &str,
        bitfinex_ws_url: &str,
        aggregator_tx: mpsc::Sender<SimpleTicker>,
    ) -> Self {
        let mut adapters = Vec::new();

        match GdaxAdapter::initialize_with_urls(gdax_ws_url, gdax_rest_url, aggregator_tx.clone())
            .await
        {
            Ok(adapter) => adapters.push(Adapter::Gdax(Arc::new(adapter))),
            Err(e) => warn!(error = %e, "GDAX adapter excluded from group"),
        }

        match BitfinexAdapter::initialize_with_url(bitfinex_ws_url, aggregator_tx).await {
            Ok(adapter) => adapters.push(Adapter::Bitfinex(Arc::new(adapter))),
            Err(e) => warn!(error = %e, "Bitfinex adapter excluded from group"),
        }

        info!(count = adapters.len(), "Fetcher group initialized");
        Self { adapters }
    }

    /// Build a group from pre-initialized adapters.
    pub fn from_adapters(adapters: Vec<Adapter>) -> Self {
        Self { adapters }
    }

    pub fn adapters(&self) -> &[Adapter] {
        &self.adapters
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Start every adapter concurrently; returns when all have stopped.
    pub async fn start(&self) {
        let mut handles = Vec::new();

        for adapter in &self.adapters {
            let adapter = adapter.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = adapter.start().await {
                    error!(adapter = adapter.name(), error = %e, "Adapter stopped with error");
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Translate the pairs per adapter and fan the command out.
    ///
    /// Every adapter is called regardless of earlier failures; the errors
    /// are collected and returned.
    pub async fn send_message(
        &self,
        action: SubscriptionAction,
        pairs: &[CurrencyPair],
        channels: &[String],
    ) -> Vec<ExchangeError> {
        let mut errors = Vec::new();

        for adapter in &self.adapters {
            let symbols = adapter.translate_currency(pairs);
            if let Err(e) = adapter.new_message(action, &symbols, channels).await {
                warn!(adapter = adapter.name(), error = %e, "Command rejected");
                errors.push(e);
            }
        }

        errors
    }

    /// Interrupt every adapter.
    pub fn stop(&self) {
        for adapter in &self.adapters {
            adapter.interrupt();
        }
    }
}
