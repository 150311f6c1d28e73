//! PriceSeries — ascending, duplicate-free bar history for one ticker.

use super::bar::Bar;
use serde::{Deserialize, Serialize};

/// Ordered bar history for one ticker.
///
/// Invariant: bars are strictly ascending by date. Constructors enforce it,
/// so every indicator can index from the end without re-checking order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Build a series from bars in any order.
    ///
    /// Sorts by date, keeps the first bar for a repeated date and drops bars
    /// with no price fields at all (holidays in provider output).
    pub fn new(ticker: impl Into<String>, mut bars: Vec<Bar>) -> Self {
        bars.retain(|b| !b.is_void());
        // Stable sort keeps the first occurrence ahead of later duplicates.
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Self {
            ticker: ticker.into(),
            bars,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Most recent bar.
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Close price `offset` bars before the latest one (0 = latest).
    pub fn close_back(&self, offset: usize) -> Option<f64> {
        let n = self.bars.len();
        if offset >= n {
            return None;
        }
        Some(self.bars[n - 1 - offset].close)
    }

    /// Close prices in date order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}
