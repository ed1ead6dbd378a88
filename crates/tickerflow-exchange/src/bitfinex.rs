//! Bitfinex adapter.
//!
//! Speaks the v1 websocket protocol: JSON objects for subscription acks,
//! bare JSON arrays for ticker data. The exchange assigns a numeric
//! channel id per (channel, pair) subscription; the adapter keeps the
//! mapping because unsubscribing requires it.

use crate::error::{ExchangeError, ExchangeResult};
use crate::SubscriptionAction;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tickerflow_core::{to_bitfinex_symbols, CurrencyPair, SimpleTicker};
use tickerflow_ws::{Proxy, ProxyConfig, ProxyHandle};
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tracing::{debug, info, warn};

pub const BITFINEX_WS_URL: &str = "wss://api.bitfinex.com/ws";

const EXCHANGE_LABEL: &str = "Bitfinex";

/// One acknowledged subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitfinexSubscription {
    pub chan_id: i64,
    pub channel: String,
    /// Normalized pair as reported by the exchange (e.g. "BTCUSD").
    pub pair: String,
}

#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    event: &'a str,
    channel: &'a str,
    symbol: &'a str,
}

#[derive(Debug, Serialize)]
struct UnsubscribeRequest {
    event: &'static str,
    #[serde(rename = "chanId")]
    chan_id: i64,
}

#[derive(Debug, Deserialize)]
struct EventFrame {
    event: String,
}

#[derive(Debug, Deserialize)]
struct SubscribedAck {
    channel: String,
    #[serde(rename = "chanId")]
    chan_id: i64,
    pair: String,
}

/// Unsubscribe ack. The exchange has been seen emitting both `chanId`
/// and `ChanId`; accept either spelling.
#[derive(Debug, Deserialize)]
struct UnsubscribedAck {
    #[serde(rename = "chanId", alias = "ChanId")]
    chan_id: i64,
}

/// Decoded 11-field ticker array.
#[derive(Debug, Clone, PartialEq)]
struct TickerArray {
    chan_id: i64,
    bid: f64,
    bid_size: f64,
    ask: f64,
    ask_size: f64,
    daily_change: f64,
    daily_change_pct: f64,
    last_price: f64,
    volume: f64,
    high: f64,
    low: f64,
}

/// Decode a bare-array frame.
///
/// Returns `Ok(None)` for heartbeats (`hb` in the second slot) and for
/// arrays that are not exactly 11 fields; those carry no ticker data.
fn decode_ticker_array(text: &str) -> ExchangeResult<Option<TickerArray>> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| ExchangeError::Decode(format!("not an array frame: {text}")))?;

    let fields: Vec<&str> = inner.split(',').map(str::trim).collect();

    if fields.get(1).map(|f| f.trim_matches('"')) == Some("hb") {
        return Ok(None);
    }

    if fields.len() != 11 {
        return Ok(None);
    }

    let mut values = [0.0f64; 11];
    for (i, field) in fields.iter().enumerate() {
        values[i] = field
            .parse()
            .map_err(|_| ExchangeError::Decode(format!("non-numeric field {field:?} in {text}")))?;
    }

    Ok(Some(TickerArray {
        chan_id: values[0] as i64,
        bid: values[1],
        bid_size: values[2],
        ask: values[3],
        ask_size: values[4],
        daily_change: values[5],
        daily_change_pct: values[6],
        last_price: values[7],
        volume: values[8],
        high: values[9],
        low: values[10],
    }))
}

/// Subscription table keyed by exchange-assigned channel id.
#[derive(Debug, Default)]
struct SubscriptionTable {
    entries: Vec<BitfinexSubscription>,
}

impl SubscriptionTable {
    fn subscribed(&mut self, ack: SubscribedAck) {
        self.entries.push(BitfinexSubscription {
            chan_id: ack.chan_id,
            channel: ack.channel,
            pair: ack.pair,
        });
    }

    fn unsubscribed(&mut self, chan_id: i64) {
        self.entries.retain(|s| s.chan_id != chan_id);
    }

    fn pair_for(&self, chan_id: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|s| s.chan_id == chan_id)
            .map(|s| s.pair.as_str())
    }

    /// Find the channel id for a (channel, symbol) pair.
    ///
    /// The symbol may be given in wire form (`tBTCUSD`) or as the stored
    /// pair (`BTCUSD`).
    fn chan_id_for(&self, channel: &str, symbol: &str) -> Option<i64> {
        let bare = symbol.strip_prefix('t').unwrap_or(symbol);
        self.entries
            .iter()
            .find(|s| s.channel == channel && (s.pair == symbol || s.pair == bare))
            .map(|s| s.chan_id)
    }

    /// One subscribe frame per current record, for reconnect replay.
    fn replay_frames(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|s| {
                serde_json::to_string(&SubscribeRequest {
                    event: "subscribe",
                    channel: &s.channel,
                    symbol: &s.pair,
                })
                .ok()
            })
            .collect()
    }
}

/// Bitfinex exchange adapter.
pub struct BitfinexAdapter {
    proxy: Proxy,
    handle: ProxyHandle,
    response_rx: TokioMutex<mpsc::Receiver<String>>,
    aggregator_tx: mpsc::Sender<SimpleTicker>,
    table: RwLock<SubscriptionTable>,
}

impl BitfinexAdapter {
    /// Construct the adapter and dial the exchange.
    pub async fn initialize(
        aggregator_tx: mpsc::Sender<SimpleTicker>,
    ) -> ExchangeResult<Self> {
        Self::initialize_with_url(BITFINEX_WS_URL, aggregator_tx).await
    }

    /// Construct against a specific websocket endpoint.
    pub async fn initialize_with_url(
        url: &str,
        aggregator_tx: mpsc::Sender<SimpleTicker>,
    ) -> ExchangeResult<Self> {
        let (response_tx, response_rx) = mpsc::channel(256);

        let proxy = Proxy::connect(
            ProxyConfig {
                url: url.to_string(),
                label: EXCHANGE_LABEL.to_string(),
            },
            response_tx,
        )
        .await?;
        let handle = proxy.handle();

        Ok(Self {
            proxy,
            handle,
            response_rx: TokioMutex::new(response_rx),
            aggregator_tx,
            table: RwLock::new(SubscriptionTable::default()),
        })
    }

    /// Run the response listener and the proxy loop until interrupt.
    pub async fn start(self: &Arc<Self>) -> ExchangeResult<()> {
        let listener = {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.listen_responses().await })
        };

        let result = self.proxy.start().await;

        // Release the listener if the proxy stopped on its own.
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
                            warn!(error = %e, "Bitfinex frame dropped");
                        }
                    }
                    None => break,
                },
            }
        }
    }

    async fn decode_frame(&self, text: &str) -> ExchangeResult<()> {
        match text.trim_start().bytes().next() {
            Some(b'[') => self.handle_ticker(text).await,
            Some(b'{') => self.handle_event(text),
            _ => Err(ExchangeError::Unsupported(text.to_string())),
        }
    }

    async fn handle_ticker(&self, text: &str) -> ExchangeResult<()> {
        let Some(array) = decode_ticker_array(text)? else {
            return Ok(());
        };

        let pair = self
            .table
            .read()
            .pair_for(array.chan_id)
            .map(str::to_string);
        let Some(pair) = pair else {
            debug!(chan_id = array.chan_id, "Ticker for unknown channel dropped");
            return Ok(());
        };

        let ticker = SimpleTicker {
            exchange: EXCHANGE_LABEL.to_string(),
            symbol: pair,
            price: array.last_price,
            bid: array.bid,
            ask: array.ask,
            volume: array.volume,
        };

        self.aggregator_tx
            .send(ticker)
            .await
            .map_err(|_| ExchangeError::ChannelClosed)
    }

    fn handle_event(&self, text: &str) -> ExchangeResult<()> {
        let head: EventFrame = serde_json::from_str(text)?;

        match head.event.as_str() {
            "subscribed" => {
                let ack: SubscribedAck = serde_json::from_str(text)?;
                info!(chan_id = ack.chan_id, pair = %ack.pair, channel = %ack.channel, "Subscribed");
                let mut table = self.table.write();
                table.subscribed(ack);
                self.handle.subscriptions().replace(table.replay_frames());
            }
            "unsubscribed" => {
                let ack: UnsubscribedAck = serde_json::from_str(text)?;
                info!(chan_id = ack.chan_id, "Unsubscribed");
                let mut table = self.table.write();
                table.unsubscribed(ack.chan_id);
                self.handle.subscriptions().replace(table.replay_frames());
            }
            _ => {}
        }

        Ok(())
    }

    /// Build and enqueue subscribe/unsubscribe frames, one per
    /// (symbol, channel) pair.
    ///
    /// Unsubscribing requires the exchange-assigned channel id; when no
    /// current subscription matches, the operation fails without sending
    /// anything.
    pub async fn new_message(
        &self,
        action: SubscriptionAction,
        symbols: &[String],
        channels: &[String],
    ) -> ExchangeResult<()> {
        for symbol in symbols {
            for channel in channels {
                let frame = match action {
                    SubscriptionAction::Subscribe => serde_json::to_string(&SubscribeRequest {
                        event: "subscribe",
                        channel,
                        symbol,
                    })?,
                    SubscriptionAction::Unsubscribe => {
                        let chan_id = self.table.read().chan_id_for(channel, symbol).ok_or_else(
                            || ExchangeError::SubscriptionNotFound {
                                channel: channel.clone(),
                                symbol: symbol.clone(),
                            },
                        )?;
                        serde_json::to_string(&UnsubscribeRequest {
                            event: "unsubscribe",
                            chan_id,
                        })?
                    }
                };

                self.handle.send(frame).await?;
            }
        }

        Ok(())
    }

    /// Map canonical pairs to Bitfinex wire symbols.
    pub fn translate_currency(&self, pairs: &[CurrencyPair]) -> Vec<String> {
        to_bitfinex_symbols(pairs)
    }

    /// Stop the proxy and the response listener.
    pub fn interrupt(&self) {
        self.handle.interrupt();
    }

    /// Current acknowledged subscriptions.
    pub fn active_subscriptions(&self) -> Vec<BitfinexSubscription> {
        self.table.read().entries.clone()
    }

    /// Handle to the underlying proxy (state, replay log).
    pub fn proxy_handle(&self) -> ProxyHandle {
        self.handle.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack(chan_id: i64, channel: &str, pair: &str) -> SubscribedAck {
        SubscribedAck {
            channel: channel.to_string(),
            chan_id,
            pair: pair.to_string(),
        }
    }

    #[test]
    fn test_decode_ticker_array() {
        let array = decode_ticker_array("[7,99,1,101,1,0,0,100,5,110,90]")
            .unwrap()
            .unwrap();

        assert_eq!(array.chan_id, 7);
        assert_eq!(array.bid, 99.0);
        assert_eq!(array.ask, 101.0);
        assert_eq!(array.last_price, 100.0);
        assert_eq!(array.volume, 5.0);
        assert_eq!(array.high, 110.0);
        assert_eq!(array.low, 90.0);
    }

    #[test]
    fn test_decode_heartbeat_yields_nothing() {
        assert_eq!(decode_ticker_array("[7,hb]").unwrap(), None);
        assert_eq!(decode_ticker_array(r#"[7,"hb"]"#).unwrap(), None);
    }

    #[test]
    fn test_decode_wrong_arity_yields_nothing() {
        assert_eq!(decode_ticker_array("[7,1,2,3]").unwrap(), None);
    }

    #[test]
    fn test_decode_non_numeric_is_error() {
        let err = decode_ticker_array("[7,99,1,abc,1,0,0,100,5,110,90]").unwrap_err();
        assert!(matches!(err, ExchangeError::Decode(_)));
    }

    #[test]
    fn test_decode_not_an_array_is_error() {
        assert!(decode_ticker_array("7,99,1").is_err());
    }

    #[test]
    fn test_table_lookup_by_chan_id() {
        let mut table = SubscriptionTable::default();
        table.subscribed(ack(7, "ticker", "BTCUSD"));

        assert_eq!(table.pair_for(7), Some("BTCUSD"));
        assert_eq!(table.pair_for(8), None);
    }

    #[test]
    fn test_table_chan_id_for_accepts_both_symbol_forms() {
        let mut table = SubscriptionTable::default();
        table.subscribed(ack(7, "ticker", "BTCUSD"));

        assert_eq!(table.chan_id_for("ticker", "BTCUSD"), Some(7));
        assert_eq!(table.chan_id_for("ticker", "tBTCUSD"), Some(7));
        assert_eq!(table.chan_id_for("trades", "BTCUSD"), None);
        assert_eq!(table.chan_id_for("ticker", "ETHUSD"), None);
    }

    #[test]
    fn test_table_unsubscribe_removes_entry() {
        let mut table = SubscriptionTable::default();
        table.subscribed(ack(7, "ticker", "BTCUSD"));
        table.subscribed(ack(9, "ticker", "ETHUSD"));

        table.unsubscribed(7);
        assert_eq!(table.pair_for(7), None);
        assert_eq!(table.pair_for(9), Some("ETHUSD"));
    }

    #[test]
    fn test_replay_frames_one_per_record() {
        let mut table = SubscriptionTable::default();
        table.subscribed(ack(7, "ticker", "BTCUSD"));
        table.subscribed(ack(9, "ticker", "ETHUSD"));

        let frames = table.replay_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[0],
            r#"{"event":"subscribe","channel":"ticker","symbol":"BTCUSD"}"#
        );
        assert_eq!(
            frames[1],
            r#"{"event":"subscribe","channel":"ticker","symbol":"ETHUSD"}"#
        );
    }

    #[test]
    fn test_unsubscribed_ack_accepts_both_casings() {
        let lower: UnsubscribedAck =
            serde_json::from_str(r#"{"event":"unsubscribed","status":"OK","chanId":7}"#).unwrap();
        assert_eq!(lower.chan_id, 7);

        let upper: UnsubscribedAck =
            serde_json::from_str(r#"{"event":"unsubscribed","status":"OK","ChanId":7}"#).unwrap();
        assert_eq!(upper.chan_id, 7);
    }

    #[test]
    fn test_subscribe_request_wire_shape() {
        let frame = serde_json::to_string(&SubscribeRequest {
            event: "subscribe",
            channel: "ticker",
            symbol: "tBTCUSD",
        })
        .unwrap();

        assert_eq!(
            frame,
            r#"{"event":"subscribe","channel":"ticker","symbol":"tBTCUSD"}"#
        );
    }

    #[test]
    fn test_unsubscribe_request_wire_shape() {
        let frame = serde_json::to_string(&UnsubscribeRequest {
            event: "unsubscribe",
            chan_id: 7,
        })
        .unwrap();

        assert_eq!(frame, r#"{"event":"unsubscribe","chanId":7}"#);
    }
}
