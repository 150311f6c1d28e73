//! Fundamental snapshot — valuation and quality metrics for one ticker.
//!
//! Percent-valued metrics (`dividend_yield`, `roe`, `profit_margin`) are stored
//! as percentages (3.5 means 3.5%). Data sources convert fractional inputs at
//! the boundary. A metric the source could not obtain is `None`, never zero.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Names of the metrics a snapshot can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundamentalMetric {
    PeRatio,
    DividendYield,
    PriceToBook,
    Roe,
    MarketCap,
    ProfitMargin,
    DebtToEquity,
}

impl FundamentalMetric {
    pub const ALL: [FundamentalMetric; 7] = [
        FundamentalMetric::PeRatio,
        FundamentalMetric::DividendYield,
        FundamentalMetric::PriceToBook,
        FundamentalMetric::Roe,
        FundamentalMetric::MarketCap,
        FundamentalMetric::ProfitMargin,
        FundamentalMetric::DebtToEquity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FundamentalMetric::PeRatio => "pe_ratio",
            FundamentalMetric::DividendYield => "dividend_yield",
            FundamentalMetric::PriceToBook => "price_to_book",
            FundamentalMetric::Roe => "roe",
            FundamentalMetric::MarketCap => "market_cap",
            FundamentalMetric::ProfitMargin => "profit_margin",
            FundamentalMetric::DebtToEquity => "debt_to_equity",
        }
    }
}

impl fmt::Display for FundamentalMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FundamentalMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        FundamentalMetric::ALL
            .into_iter()
            .find(|m| m.as_str() == needle)
            .ok_or_else(|| format!("unknown fundamental metric '{s}'"))
    }
}

/// Per-ticker set of optional fundamental metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub price_to_book: Option<f64>,
    pub roe: Option<f64>,
    pub market_cap: Option<f64>,
    pub profit_margin: Option<f64>,
    pub debt_to_equity: Option<f64>,
}

impl FundamentalSnapshot {
    /// Snapshot with every metric absent (the result of a failed fetch).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Value of a metric, treating non-finite values as absent.
    pub fn get(&self, metric: FundamentalMetric) -> Option<f64> {
        let raw = match metric {
            FundamentalMetric::PeRatio => self.pe_ratio,
            FundamentalMetric::DividendYield => self.dividend_yield,
            FundamentalMetric::PriceToBook => self.price_to_book,
            FundamentalMetric::Roe => self.roe,
            FundamentalMetric::MarketCap => self.market_cap,
            FundamentalMetric::ProfitMargin => self.profit_margin,
            FundamentalMetric::DebtToEquity => self.debt_to_equity,
        };
        raw.filter(|v| v.is_finite())
    }

    pub fn set(&mut self, metric: FundamentalMetric, value: Option<f64>) {
        let slot = match metric {
            FundamentalMetric::PeRatio => &mut self.pe_ratio,
            FundamentalMetric::DividendYield => &mut self.dividend_yield,
            FundamentalMetric::PriceToBook => &mut self.price_to_book,
            FundamentalMetric::Roe => &mut self.roe,
            FundamentalMetric::MarketCap => &mut self.market_cap,
            FundamentalMetric::ProfitMargin => &mut self.profit_margin,
            FundamentalMetric::DebtToEquity => &mut self.debt_to_equity,
        };
        *slot = value;
    }

    /// True if no metric carries a usable value.
    pub fn is_empty(&self) -> bool {
        FundamentalMetric::ALL.iter().all(|m| self.get(*m).is_none())
    }
}
