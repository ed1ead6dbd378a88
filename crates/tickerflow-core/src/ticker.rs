//! Normalized ticker records flowing through the pipeline.

use serde::{Deserialize, Serialize};

/// Normalized market snapshot produced by an exchange adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleTicker {
    /// Origin exchange label (e.g. "Bitfinex").
    pub exchange: String,
    /// Normalized symbol, base concatenated with quote (e.g. "BTCUSD").
    pub symbol: String,
    /// Last traded price.
    pub price: f64,
    /// Best bid.
    pub bid: f64,
    /// Best ask.
    pub ask: f64,
    /// 24h traded volume.
    pub volume: f64,
}

/// Exchange-independent running aggregate for one symbol.
///
/// Carries the same numeric fields as [`SimpleTicker`]; prices are the
/// volume-weighted blend of every contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedTicker {
    pub symbol: String,
    pub price: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume: f64,
}

impl AggregatedTicker {
    /// Seed an aggregate from its first contribution, fields copied verbatim.
    pub fn from_first(t: &SimpleTicker) -> Self {
        Self {
            symbol: t.symbol.clone(),
            price: t.price,
            bid: t.bid,
            ask: t.ask,
            volume: t.volume,
        }
    }
}
