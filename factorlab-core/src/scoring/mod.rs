//! Factor scoring: momentum, technical and fundamental factors, the weighted
//! composite, and the ranker.
//!
//! Every function here is pure: inputs are borrowed, outputs are freshly
//! allocated maps keyed by ticker. Data problems never raise; a ticker that
//! cannot be scored is left out of the output and the reason is recorded as
//! an [`Omission`].

pub mod composite;
pub mod fundamental;
pub mod momentum;
pub mod rank;
pub mod technical;

pub use composite::{composite, normalize_momentum, normalize_technical, ScoreBreakdown, Weights};
pub use fundamental::{
    cross_section_stats, dividend_score, fundamental, fundamental_of, pb_score, pe_score,
    roe_score, CrossSectionStats, FundamentalBreakdown, MetricRange,
};
pub use momentum::{momentum, momentum_detailed, momentum_of};
pub use rank::{rank, rank_composite, rank_map, RankedEntry, RankedList};
pub use technical::{
    rsi_signal, technical, technical_composites, technical_detailed, technical_of,
    IndicatorSnapshot, TechnicalBreakdown, TechnicalSignals,
};

use crate::domain::TickerMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a ticker (or a single term) could not be scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Omission {
    /// The series is shorter than the computation needs.
    InsufficientHistory { bars: usize, required: usize },
    /// A close referenced by the formula is zero, negative, or not finite.
    InvalidClose,
    /// No bars at all.
    NoPriceData,
}

impl fmt::Display for Omission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Omission::InsufficientHistory { bars, required } => {
                write!(f, "insufficient history ({bars} bars, {required} required)")
            }
            Omission::InvalidClose => f.write_str("invalid close price"),
            Omission::NoPriceData => f.write_str("no price data"),
        }
    }
}

/// Scores for the tickers that could be scored, plus the reasons for the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scored<T> {
    pub scores: TickerMap<T>,
    pub omitted: TickerMap<Omission>,
}

impl<T> Scored<T> {
    pub fn new() -> Self {
        Self {
            scores: TickerMap::new(),
            omitted: TickerMap::new(),
        }
    }

    fn record(&mut self, ticker: &str, outcome: Result<T, Omission>) {
        match outcome {
            Ok(score) => {
                self.scores.insert(ticker.to_string(), score);
            }
            Err(reason) => {
                self.omitted.insert(ticker.to_string(), reason);
            }
        }
    }
}

/// Build a price series from close prices for testing.
#[cfg(test)]
pub(crate) fn make_series(ticker: &str, closes: &[f64]) -> crate::domain::PriceSeries {
    crate::domain::PriceSeries::new(ticker, crate::indicators::make_bars(closes))
}
