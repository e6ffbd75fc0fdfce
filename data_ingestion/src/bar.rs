use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV observation. A `NaN` field marks a missing value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Bar with every price set to `close`.
    pub fn flat(timestamp: DateTime<Utc>, close: f64, volume: f64) -> Self {
        Self::new(timestamp, close, close, close, close, volume)
    }
}
