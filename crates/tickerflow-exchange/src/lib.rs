//! Exchange adapters for the ticker aggregation pipeline.
//!
//! Each adapter owns a websocket proxy, speaks its exchange's wire
//! protocol, tracks subscriptions, and emits normalized [`SimpleTicker`]s
//! into the shared aggregator inbox. The [`FetcherGroup`] fans
//! subscribe/unsubscribe commands across every healthy adapter.
//!
//! [`SimpleTicker`]: tickerflow_core::SimpleTicker

pub mod bitfinex;
pub mod error;
pub mod gdax;
pub mod group;

pub use bitfinex::{BitfinexAdapter, BitfinexSubscription, BITFINEX_WS_URL};
pub use error::{ExchangeError, ExchangeResult};
pub use gdax::{GdaxAdapter, SubscribeFrame, GDAX_REST_URL, GDAX_WS_URL};
pub use group::{Adapter, FetcherGroup};

/// Subscription command direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionAction {
    Subscribe,
    Unsubscribe,
}

impl SubscriptionAction {
    /// The `type`/`event` string used on the wire.
    pub fn wire_type(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}
