//! Domain types for FactorLab

pub mod bar;
pub mod fundamentals;
pub mod market;
pub mod period;
pub mod series;

use std::collections::BTreeMap;

pub use bar::Bar;
pub use fundamentals::{FundamentalMetric, FundamentalSnapshot};
pub use market::{Market, MarketInfo};
pub use period::{Period, PeriodParseError};
pub use series::PriceSeries;

/// Ticker symbol type alias
pub type Ticker = String;

/// Per-ticker mapping used at every stage of the pipeline.
///
/// Ordered by ticker so that iteration order, and therefore tie-breaking in the
/// ranker, is identical across runs and platforms.
pub type TickerMap<T> = BTreeMap<Ticker, T>;
