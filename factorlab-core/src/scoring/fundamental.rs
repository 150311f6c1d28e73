//! Fundamental factor — fixed piecewise scores for valuation and quality.
//!
//! Each scorer maps one metric onto roughly [0, 1] using absolute thresholds.
//! A missing metric resolves to a neutral default, so every ticker with a
//! snapshot is scored, including one whose fetch failed entirely.
//!
//! composite = 0.3 * pe + 0.3 * dividend + 0.2 * pb + 0.2 * roe

use crate::domain::{FundamentalMetric, FundamentalSnapshot, TickerMap};
use serde::{Deserialize, Serialize};

pub const PE_WEIGHT: f64 = 0.3;
pub const DIVIDEND_WEIGHT: f64 = 0.3;
pub const PB_WEIGHT: f64 = 0.2;
pub const ROE_WEIGHT: f64 = 0.2;

/// Per-metric scores and their weighted composite for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalBreakdown {
    pub metrics: FundamentalSnapshot,
    pub pe_score: f64,
    pub dividend_score: f64,
    pub pb_score: f64,
    pub roe_score: f64,
    pub composite: f64,
}

/// P/E: best around 17.5, flat 0.5 below 10, decaying to 0 at 75.
pub fn pe_score(pe: Option<f64>) -> f64 {
    match pe {
        None => 0.5,
        Some(pe) if (10.0..=25.0).contains(&pe) => 1.0 - (pe - 17.5).abs() / 17.5,
        Some(pe) if pe < 10.0 => 0.5,
        Some(pe) => (1.0 - (pe - 25.0) / 50.0).max(0.0),
    }
}

/// Dividend yield (percent): 2-6% is ideal, no dividend is penalised.
pub fn dividend_score(dividend_yield: Option<f64>) -> f64 {
    match dividend_yield {
        None => 0.3,
        Some(y) if (2.0..=6.0).contains(&y) => 1.0,
        Some(y) if y < 2.0 => y / 2.0,
        Some(y) => (1.0 - (y - 6.0) / 10.0).max(0.7),
    }
}

/// Price-to-book: below 1 is cheapest, above 3 is expensive.
pub fn pb_score(pb: Option<f64>) -> f64 {
    match pb {
        Some(pb) if pb > 0.0 => {
            if pb < 1.0 {
                1.0
            } else if pb <= 3.0 {
                1.0 - (pb - 1.0) / 2.0
            } else {
                (0.5 - (pb - 3.0) / 10.0).max(0.0)
            }
        }
        _ => 0.5,
    }
}

/// Return on equity (percent), tiered.
pub fn roe_score(roe: Option<f64>) -> f64 {
    match roe {
        None => 0.5,
        Some(r) if r >= 20.0 => 1.0,
        Some(r) if r >= 15.0 => 0.8,
        Some(r) if r >= 10.0 => 0.6,
        Some(r) if r >= 0.0 => 0.4,
        Some(_) => 0.1,
    }
}

/// Score one snapshot.
pub fn fundamental_of(snapshot: &FundamentalSnapshot) -> FundamentalBreakdown {
    let pe = pe_score(snapshot.get(FundamentalMetric::PeRatio));
    let dividend = dividend_score(snapshot.get(FundamentalMetric::DividendYield));
    let pb = pb_score(snapshot.get(FundamentalMetric::PriceToBook));
    let roe = roe_score(snapshot.get(FundamentalMetric::Roe));
    FundamentalBreakdown {
        metrics: snapshot.clone(),
        pe_score: pe,
        dividend_score: dividend,
        pb_score: pb,
        roe_score: roe,
        composite: pe * PE_WEIGHT + dividend * DIVIDEND_WEIGHT + pb * PB_WEIGHT + roe * ROE_WEIGHT,
    }
}

/// Score every snapshot. The output has exactly the input's tickers.
pub fn fundamental(snapshots: &TickerMap<FundamentalSnapshot>) -> TickerMap<FundamentalBreakdown> {
    snapshots
        .iter()
        .map(|(ticker, snap)| (ticker.clone(), fundamental_of(snap)))
        .collect()
}

/// Observed range of one metric across a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRange {
    pub min: f64,
    pub max: f64,
    /// Number of tickers that reported the metric; 0 means `min`/`max` are defaults.
    pub observed: usize,
}

impl MetricRange {
    fn collect(values: impl Iterator<Item = f64>, default: (f64, f64)) -> Self {
        let mut range: Option<(f64, f64)> = None;
        let mut observed = 0;
        for v in values {
            observed += 1;
            range = Some(match range {
                None => (v, v),
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
            });
        }
        let (min, max) = range.unwrap_or(default);
        Self { min, max, observed }
    }
}

/// Cross-sectional min/max of the scored metrics.
///
/// Reported alongside the scores for context only: the piecewise scorers use
/// fixed absolute thresholds and do not read these ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossSectionStats {
    pub pe_ratio: MetricRange,
    pub dividend_yield: MetricRange,
    pub price_to_book: MetricRange,
    pub roe: MetricRange,
}

pub fn cross_section_stats(snapshots: &TickerMap<FundamentalSnapshot>) -> CrossSectionStats {
    let range = |metric: FundamentalMetric, default: (f64, f64)| {
        MetricRange::collect(snapshots.values().filter_map(|s| s.get(metric)), default)
    };
    CrossSectionStats {
        pe_ratio: range(FundamentalMetric::PeRatio, (10.0, 30.0)),
        dividend_yield: range(FundamentalMetric::DividendYield, (0.0, 10.0)),
        price_to_book: range(FundamentalMetric::PriceToBook, (0.0, 5.0)),
        roe: range(FundamentalMetric::Roe, (-10.0, 30.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    const EPS: f64 = 1e-12;

    #[test]
    fn empty_snapshot_composite_is_044() {
        let b = fundamental_of(&FundamentalSnapshot::empty());
        assert_eq!(
            (b.pe_score, b.dividend_score, b.pb_score, b.roe_score),
            (0.5, 0.3, 0.5, 0.5)
        );
        assert_approx(b.composite, 0.44, EPS);
    }

    #[test]
    fn pe_branches() {
        assert_approx(pe_score(Some(17.5)), 1.0, EPS);
        assert_approx(pe_score(Some(10.0)), 1.0 - 7.5 / 17.5, EPS);
        assert_approx(pe_score(Some(25.0)), 1.0 - 7.5 / 17.5, EPS);
        assert_eq!(pe_score(Some(9.99)), 0.5);
        assert_eq!(pe_score(Some(-4.0)), 0.5);
        assert_approx(pe_score(Some(50.0)), 0.5, EPS);
        assert_eq!(pe_score(Some(200.0)), 0.0);
    }

    #[test]
    fn dividend_branches() {
        assert_eq!(dividend_score(Some(2.0)), 1.0);
        assert_eq!(dividend_score(Some(6.0)), 1.0);
        assert_approx(dividend_score(Some(1.0)), 0.5, EPS);
        assert_eq!(dividend_score(Some(0.0)), 0.0);
        assert_approx(dividend_score(Some(8.0)), 0.8, EPS);
        assert_eq!(dividend_score(Some(15.0)), 0.7);
    }

    #[test]
    fn pb_branches() {
        assert_eq!(pb_score(None), 0.5);
        assert_eq!(pb_score(Some(0.0)), 0.5);
        assert_eq!(pb_score(Some(-1.0)), 0.5);
        assert_eq!(pb_score(Some(0.8)), 1.0);
        assert_eq!(pb_score(Some(1.0)), 1.0);
        assert_approx(pb_score(Some(2.0)), 0.5, EPS);
        assert_approx(pb_score(Some(3.0)), 0.0, EPS);
        assert_approx(pb_score(Some(4.0)), 0.4, EPS);
        assert_eq!(pb_score(Some(10.0)), 0.0);
    }

    #[test]
    fn roe_tiers() {
        assert_eq!(roe_score(Some(25.0)), 1.0);
        assert_eq!(roe_score(Some(20.0)), 1.0);
        assert_eq!(roe_score(Some(15.0)), 0.8);
        assert_eq!(roe_score(Some(12.0)), 0.6);
        assert_eq!(roe_score(Some(0.0)), 0.4);
        assert_eq!(roe_score(Some(-3.0)), 0.1);
    }

    #[test]
    fn failed_fetch_still_scored() {
        let mut snaps = TickerMap::new();
        snaps.insert("FAIL".to_string(), FundamentalSnapshot::empty());
        snaps.insert(
            "GOOD".to_string(),
            FundamentalSnapshot {
                pe_ratio: Some(17.5),
                dividend_yield: Some(4.0),
                price_to_book: Some(0.9),
                roe: Some(22.0),
                ..Default::default()
            },
        );
        let scores = fundamental(&snaps);
        assert_eq!(scores.len(), 2);
        assert_approx(scores["GOOD"].composite, 1.0, EPS);
    }

    #[test]
    fn stats_use_defaults_when_unobserved() {
        let mut snaps = TickerMap::new();
        snaps.insert("A".to_string(), FundamentalSnapshot { pe_ratio: Some(12.0), ..Default::default() });
        snaps.insert("B".to_string(), FundamentalSnapshot { pe_ratio: Some(30.0), ..Default::default() });
        let stats = cross_section_stats(&snaps);
        assert_eq!((stats.pe_ratio.min, stats.pe_ratio.max, stats.pe_ratio.observed), (12.0, 30.0, 2));
        assert_eq!((stats.roe.min, stats.roe.max, stats.roe.observed), (-10.0, 30.0, 0));
    }
}
