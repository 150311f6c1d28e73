//! Screen fingerprinting: deterministic identification of a screen's inputs.
//!
//! - `ConfigHash`: BLAKE3 of the canonical JSON of every scoring-relevant
//!   setting (universe, period, window, weights, data source).
//! - `DatasetHash`: BLAKE3 over the price series actually scored.
//!
//! Two reports with equal hashes were produced from the same inputs.

use crate::domain::{PriceSeries, TickerMap};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl ConfigHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    /// Hash tickers, dates and closes in ticker order.
    pub fn of_series(series: &TickerMap<PriceSeries>) -> Self {
        let mut hasher = blake3::Hasher::new();
        for (ticker, s) in series {
            hasher.update(ticker.as_bytes());
            hasher.update(&(s.len() as u64).to_le_bytes());
            for bar in s.bars() {
                hasher.update(bar.date.to_string().as_bytes());
                hasher.update(&bar.close.to_le_bytes());
            }
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
