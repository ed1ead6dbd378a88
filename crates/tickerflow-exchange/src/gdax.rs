//! GDAX (Coinbase Pro) adapter.
//!
//! Frames are JSON objects dispatched on a `type` field. Ticker frames do
//! not carry a usable 24h volume, so the adapter fetches it from the REST
//! ticker endpoint through a short-TTL per-symbol cache.

use crate::error::{ExchangeError, ExchangeResult};
use crate::SubscriptionAction;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tickerflow_core::{to_gdax_symbols, CurrencyPair, SimpleTicker};
use tickerflow_ws::{Proxy, ProxyConfig, ProxyHandle};
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tracing::{debug, info, warn};

pub const GDAX_WS_URL: &str = "wss://ws-feed.pro.coinbase.com/";
pub const GDAX_REST_URL: &str = "https://api.pro.coinbase.com";

const EXCHANGE_LABEL: &str = "GDAX";

/// Timeout for the volume REST lookup.
const REST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a fetched 24h volume stays good for.
const VOLUME_TTL: Duration = Duration::from_secs(10);

/// Subscribe/unsubscribe wire frame, also the adapter's subscription
/// record once the exchange confirms it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub product_ids: Vec<String>,
    pub channels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FrameType {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct TickerFrame {
    product_id: String,
    price: String,
    best_bid: String,
    best_ask: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionsFrame {
    channels: Vec<ChannelSubscription>,
}

#[derive(Debug, Deserialize)]
struct ChannelSubscription {
    name: String,
    product_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RestTicker {
    volume: String,
}

/// Collapse a `subscriptions` frame into one ready-to-replay subscribe
/// request covering every current channel and product.
fn summarize_subscriptions(frame: &SubscriptionsFrame) -> SubscribeFrame {
    let mut channels = Vec::new();
    let mut product_ids: Vec<String> = Vec::new();

    for channel in &frame.channels {
        if !channels.contains(&channel.name) {
            channels.push(channel.name.clone());
        }
        for product in &channel.product_ids {
            if !product_ids.contains(product) {
                product_ids.push(product.clone());
            }
        }
    }

    SubscribeFrame {
        kind: "subscribe".to_string(),
        product_ids,
        channels,
    }
}

/// Per-symbol 24h volume cache.
#[derive(Debug, Default)]
struct VolumeCache {
    entries: Mutex<HashMap<String, (f64, Instant)>>,
}

impl VolumeCache {
    fn get(&self, product_id: &str) -> Option<f64> {
        let entries = self.entries.lock();
        let (volume, fetched_at) = entries.get(product_id)?;
        if fetched_at.elapsed() < VOLUME_TTL {
            Some(*volume)
        } else {
            None
        }
    }

    fn put(&self, product_id: &str, volume: f64) {
        self.entries
            .lock()
            .insert(product_id.to_string(), (volume, Instant::now()));
    }
}

/// GDAX exchange adapter.
pub struct GdaxAdapter {
    proxy: Proxy,
    handle: ProxyHandle,
    response_rx: TokioMutex<mpsc::Receiver<String>>,
    aggregator_tx: mpsc::Sender<SimpleTicker>,
    /// Authoritative subscription record, rebuilt from `subscriptions`
    /// frames.
    subscriptions: RwLock<Option<SubscribeFrame>>,
    rest: reqwest::Client,
    rest_base: String,
    volume_cache: VolumeCache,
}

impl GdaxAdapter {
    /// Construct the adapter and dial the exchange.
    pub async fn initialize(
        aggregator_tx: mpsc::Sender<SimpleTicker>,
    ) -> ExchangeResult<Self> {
        Self::initialize_with_urls(GDAX_WS_URL, GDAX_REST_URL, aggregator_tx).await
    }

    /// Construct against specific websocket and REST endpoints.
    pub async fn initialize_with_urls(
        ws_url: &str,
        rest_base: &str,
        aggregator_tx: mpsc::Sender<SimpleTicker>,
    ) -> ExchangeResult<Self> {
        let (response_tx, response_rx) = mpsc::channel(256);

        let proxy = Proxy::connect(
            ProxyConfig {
                url: ws_url.to_string(),
                label: EXCHANGE_LABEL.to_string(),
            },
            response_tx,
        )
        .await?;
        let handle = proxy.handle();

        let rest = reqwest::Client::builder()
            .timeout(REST_TIMEOUT)
            .user_agent("tickerflow/0.1")
            .build()
            .map_err(|e| ExchangeError::VolumeLookup(format!("HTTP client: {e}")))?;

        Ok(Self {
            proxy,
            handle,
            response_rx: TokioMutex::new(response_rx),
            aggregator_tx,
            subscriptions: RwLock::new(None),
            rest,
            rest_base: rest_base.trim_end_matches('/').to_string(),
            volume_cache: VolumeCache::default(),
        })
    }

    /// Run the response listener and the proxy loop until interrupt.
    pub async fn start(self: &Arc<Self>) -> ExchangeResult<()> {
        let listener = {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.listen_responses().await })
        };

        let result = self.proxy.start().await;

        self.handle.cancelled_token().cancel();
        let _ = listener.await;

        result.map_err(Into::into)
    }

    async fn listen_responses(&self) {
        let shutdown = self.handle.cancelled_token();
        let mut rx = self.response_rx.lock().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                frame = rx.recv() => match frame {
                    Some(text) => {
                        if let Err(e) = self.decode_frame(&text).await {
                            warn!(error = %e, "GDAX frame dropped");
                        }
                    }
                    None => break,
                },
            }
        }
    }

    async fn decode_frame(&self, text: &str) -> ExchangeResult<()> {
        let head: FrameType = serde_json::from_str(text)?;

        match head.kind.as_str() {
            "ticker" => self.handle_ticker(serde_json::from_str(text)?).await,
            "subscriptions" => self.handle_subscriptions(serde_json::from_str(text)?),
            _ => Ok(()),
        }
    }

    async fn handle_ticker(&self, frame: TickerFrame) -> ExchangeResult<()> {
        let price = parse_price(&frame.price, "price")?;
        let bid = parse_price(&frame.best_bid, "best_bid")?;
        let ask = parse_price(&frame.best_ask, "best_ask")?;

        let volume = self.volume_24h(&frame.product_id).await?;
        if volume == 0.0 {
            debug!(product_id = %frame.product_id, "Zero 24h volume, update dropped");
            return Ok(());
        }

        let ticker = SimpleTicker {
            exchange: EXCHANGE_LABEL.to_string(),
            symbol: frame.product_id.replace('-', ""),
            price,
            bid,
            ask,
            volume,
        };

        self.aggregator_tx
            .send(ticker)
            .await
            .map_err(|_| ExchangeError::ChannelClosed)
    }

    /// 24h volume for a product, served from the cache when fresh.
    async fn volume_24h(&self, product_id: &str) -> ExchangeResult<f64> {
        if let Some(volume) = self.volume_cache.get(product_id) {
            return Ok(volume);
        }

        let url = format!("{}/products/{}/ticker", self.rest_base, product_id);
        let response = self
            .rest
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeError::VolumeLookup(e.to_string()))?;
        let body: RestTicker = response
            .json()
            .await
            .map_err(|e| ExchangeError::VolumeLookup(e.to_string()))?;

        let volume = body
            .volume
            .parse()
            .map_err(|_| ExchangeError::Decode(format!("bad volume {:?}", body.volume)))?;

        self.volume_cache.put(product_id, volume);
        Ok(volume)
    }

    /// A `subscriptions` frame is the authoritative list of current
    /// subscriptions: rebuild the record and replace the proxy replay log
    /// with one summarizing subscribe frame.
    fn handle_subscriptions(&self, frame: SubscriptionsFrame) -> ExchangeResult<()> {
        let summary = summarize_subscriptions(&frame);
        let encoded = serde_json::to_string(&summary)?;

        info!(
            channels = ?summary.channels,
            product_ids = ?summary.product_ids,
            "Current subscriptions"
        );

        *self.subscriptions.write() = Some(summary);
        self.handle.subscriptions().replace(vec![encoded]);

        Ok(())
    }

    /// Build and enqueue one subscribe/unsubscribe frame covering the
    /// given products and channels.
    ///
    /// Unsubscribing from a (channel, product) the adapter is not
    /// subscribed to fails without sending anything.
    pub async fn new_message(
        &self,
        action: SubscriptionAction,
        product_ids: &[String],
        channels: &[String],
    ) -> ExchangeResult<()> {
        if action == SubscriptionAction::Unsubscribe {
            self.check_unsubscribe(product_ids, channels)?;
        }

        let frame = SubscribeFrame {
            kind: action.wire_type().to_string(),
            product_ids: product_ids.to_vec(),
            channels: channels.to_vec(),
        };

        self.handle.send(serde_json::to_string(&frame)?).await?;
        Ok(())
    }

    fn check_unsubscribe(
        &self,
        product_ids: &[String],
        channels: &[String],
    ) -> ExchangeResult<()> {
        let subscriptions = self.subscriptions.read();
        let not_found = |channel: &str, symbol: &str| ExchangeError::SubscriptionNotFound {
            channel: channel.to_string(),
            symbol: symbol.to_string(),
        };

        let Some(current) = subscriptions.as_ref() else {
            return Err(not_found(
                channels.first().map(String::as_str).unwrap_or_default(),
                product_ids.first().map(String::as_str).unwrap_or_default(),
            ));
        };

        for channel in channels {
            if !current.channels.contains(channel) {
                return Err(not_found(channel, ""));
            }
        }
        for product in product_ids {
            if !current.product_ids.contains(product) {
                return Err(not_found("", product));
            }
        }

        Ok(())
    }

    /// Map canonical pairs to GDAX wire symbols.
    pub fn translate_currency(&self, pairs: &[CurrencyPair]) -> Vec<String> {
        to_gdax_symbols(pairs)
    }

    /// Stop the proxy and the response listener.
    pub fn interrupt(&self) {
        self.handle.interrupt();
    }

    /// The last authoritative subscription record, if any.
    pub fn current_subscriptions(&self) -> Option<SubscribeFrame> {
        self.subscriptions.read().clone()
    }

    /// Handle to the underlying proxy (state, replay log).
    pub fn proxy_handle(&self) -> ProxyHandle {
        self.handle.clone()
    }
}

fn parse_price(value: &str, field: &str) -> ExchangeResult<f64> {
    value
        .parse()
        .map_err(|_| ExchangeError::Decode(format!("bad {field} {value:?}")))
}
