//! Canonical currency pairs and per-exchange symbol formatting.
//!
//! The catalog enumerates every pair the pipeline may subscribe to.
//! Exchanges disagree on symbol spelling (GDAX wants `BTC-USD`, Bitfinex
//! wants `tBTCUSD` on the wire), so formatting lives here next to the
//! pair definition.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered (base, quote) pair of upper-case currency codes.
///
/// Pairs are validated at construction: blank codes are rejected, so a
/// `CurrencyPair` in hand is always formattable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    base: String,
    quote: String,
}

/// The pairs supported by the pipeline, as (base, quote) codes.
pub const KNOWN_PAIRS: [(&str, &str); 10] = [
    ("BCH", "BTC"),
    ("BCH", "USD"),
    ("BTC", "EUR"),
    ("BTC", "GBP"),
    ("BTC", "USD"),
    ("ETH", "BTC"),
    ("ETH", "EUR"),
    ("ETH", "USD"),
    ("LTC", "BTC"),
    ("LTC", "EUR"),
];

impl CurrencyPair {
    /// Create a pair from two currency codes. Codes are upper-cased.
    pub fn new(base: &str, quote: &str) -> Result<Self> {
        if base.is_empty() || quote.is_empty() {
            return Err(CoreError::NotValid);
        }

        Ok(Self {
            base: base.to_uppercase(),
            quote: quote.to_uppercase(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Normalized internal symbol: base concatenated with quote (`BTCUSD`).
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    /// GDAX wire form: `BTC-USD`.
    pub fn to_gdax(&self) -> String {
        format!("{}-{}", self.base, self.quote)
    }

    /// Bitfinex wire form: `tBTCUSD`.
    pub fn to_bitfinex(&self) -> String {
        format!("t{}{}", self.base, self.quote)
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} {}}}", self.base, self.quote)
    }
}

/// Look up a pair in the catalog.
///
/// Returns `NotValid` when either code is blank and `NotFound` when the
/// pair is not in [`KNOWN_PAIRS`].
pub fn find(base: &str, quote: &str) -> Result<CurrencyPair> {
    let pair = CurrencyPair::new(base, quote)?;

    if KNOWN_PAIRS
        .iter()
        .any(|(b, q)| *b == pair.base && *q == pair.quote)
    {
        Ok(pair)
    } else {
        Err(CoreError::NotFound(pair.base, pair.quote))
    }
}

/// Format a slice of pairs as GDAX wire symbols.
pub fn to_gdax_symbols(pairs: &[CurrencyPair]) -> Vec<String> {
    pairs.iter().map(CurrencyPair::to_gdax).collect()
}

/// Format a slice of pairs as Bitfinex wire symbols.
pub fn to_bitfinex_symbols(pairs: &[CurrencyPair]) -> Vec<String> {
    pairs.iter().map(CurrencyPair::to_bitfinex).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_known_pair() {
        let pair = find("BTC", "GBP").unwrap();
        assert_eq!(pair.base(), "BTC");
        assert_eq!(pair.quote(), "GBP");
        assert_eq!(pair.symbol(), "BTCGBP");
    }

    #[test]
    fn test_find_rejects_blank_codes() {
        assert_eq!(find("BTC", ""), Err(CoreError::NotValid));
        assert_eq!(find("", "EUR"), Err(CoreError::NotValid));
        assert_eq!(find("", ""), Err(CoreError::NotValid));
    }

    #[test]
    fn test_find_unknown_pair() {
        // LTC-GBP is a real market somewhere, but not in the catalog.
        assert_eq!(
            find("LTC", "GBP"),
            Err(CoreError::NotFound("LTC".to_string(), "GBP".to_string()))
        );
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let pair = find("btc", "usd").unwrap();
        assert_eq!(pair.symbol(), "BTCUSD");
    }

    #[test]
    fn test_gdax_formatting() {
        let pairs = vec![
            find("BCH", "BTC").unwrap(),
            find("BTC", "EUR").unwrap(),
            find("BTC", "GBP").unwrap(),
        ];

        assert_eq!(
            to_gdax_symbols(&pairs),
            vec!["BCH-BTC", "BTC-EUR", "BTC-GBP"]
        );
    }

    #[test]
    fn test_bitfinex_formatting() {
        let pairs = vec![
            find("BCH", "BTC").unwrap(),
            find("BTC", "EUR").unwrap(),
            find("BTC", "GBP").unwrap(),
        ];

        assert_eq!(
            to_bitfinex_symbols(&pairs),
            vec!["tBCHBTC", "tBTCEUR", "tBTCGBP"]
        );
    }

    #[test]
    fn test_display() {
        let pair = find("ETH", "USD").unwrap();
        assert_eq!(pair.to_string(), "{ETH USD}");
    }

    #[test]
    fn test_blank_pair_unconstructable() {
        assert_eq!(CurrencyPair::new("", ""), Err(CoreError::NotValid));
    }
}
