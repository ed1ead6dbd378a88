//! Emit interval menu for the aggregator.
//!
//! Only the durations below are accepted; anything else is rejected at
//! construction, so a held `Interval` is always valid.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Interval between aggregate emissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    OneMinute,
    ThreeMinutes,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    FortyFiveMinutes,
    OneHour,
    TwoHours,
    ThreeHours,
    FourHours,
    OneDay,
    OneWeek,
    /// One month = 30 days.
    OneMonth,
}

impl Interval {
    /// Every accepted interval, shortest first.
    pub const ALL: [Interval; 13] = [
        Interval::OneMinute,
        Interval::ThreeMinutes,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::FortyFiveMinutes,
        Interval::OneHour,
        Interval::TwoHours,
        Interval::ThreeHours,
        Interval::FourHours,
        Interval::OneDay,
        Interval::OneWeek,
        Interval::OneMonth,
    ];

    pub fn as_secs(self) -> u64 {
        match self {
            Self::OneMinute => 60,
            Self::ThreeMinutes => 180,
            Self::FiveMinutes => 300,
            Self::FifteenMinutes => 900,
            Self::ThirtyMinutes => 1800,
            Self::FortyFiveMinutes => 2700,
            Self::OneHour => 3600,
            Self::TwoHours => 7200,
            Self::ThreeHours => 10800,
            Self::FourHours => 14400,
            Self::OneDay => 86400,
            Self::OneWeek => 604800,
            Self::OneMonth => 2592000,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::from_secs(self.as_secs())
    }

    /// Parse a second count against the accepted menu.
    pub fn from_secs(secs: u64) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|i| i.as_secs() == secs)
            .ok_or_else(|| CoreError::UnsupportedInterval(format!("{secs}s")))
    }

    /// Parse a control-plane token (`1m`, `3m`, ..., `1H`, ..., `1M`).
    pub fn from_token(token: &str) -> Result<Self> {
        let interval = match token {
            "1m" => Self::OneMinute,
            "3m" => Self::ThreeMinutes,
            "5m" => Self::FiveMinutes,
            "15m" => Self::FifteenMinutes,
            "30m" => Self::ThirtyMinutes,
            "45m" => Self::FortyFiveMinutes,
            "1H" => Self::OneHour,
            "2H" => Self::TwoHours,
            "3H" => Self::ThreeHours,
            "4H" => Self::FourHours,
            "1D" => Self::OneDay,
            "1W" => Self::OneWeek,
            "1M" => Self::OneMonth,
            other => return Err(CoreError::UnsupportedInterval(other.to_string())),
        };

        Ok(interval)
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::OneMinute
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs())
    }
}
