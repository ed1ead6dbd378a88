//! Core domain types for the ticker aggregation pipeline.
//!
//! This crate provides the types shared by every stage:
//! - `CurrencyPair` and the catalog of supported pairs
//! - `SimpleTicker`: normalized per-exchange market snapshot
//! - `AggregatedTicker`: volume-weighted per-symbol blend
//! - `Interval`: the accepted emit interval menu

pub mod currency;
pub mod error;
pub mod interval;
pub mod ticker;

pub use currency::{find, to_bitfinex_symbols, to_gdax_symbols, CurrencyPair, KNOWN_PAIRS};
pub use error::{CoreError, Result};
pub use interval::Interval;
pub use ticker::{AggregatedTicker, SimpleTicker};
