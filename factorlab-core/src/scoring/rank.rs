//! Ranker: descending sort of a score map, truncated to `top_n`.

use crate::domain::{Ticker, TickerMap};
use crate::scoring::ScoreBreakdown;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub ticker: Ticker,
    pub score: f64,
}

pub type RankedList = Vec<RankedEntry>;

/// Sort descending by score and keep the first `top_n`.
///
/// The sort is stable, so exact ties keep input order. NaN scores sort last.
pub fn rank<I, K>(scores: I, top_n: usize) -> RankedList
where
    I: IntoIterator<Item = (K, f64)>,
    K: Into<Ticker>,
{
    if top_n == 0 {
        return Vec::new();
    }
    let mut entries: RankedList = scores
        .into_iter()
        .map(|(ticker, score)| RankedEntry {
            ticker: ticker.into(),
            score,
        })
        .collect();
    entries.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
        (false, false) => b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    });
    entries.truncate(top_n);
    entries
}

/// Rank a ticker map. Ties fall back to ticker order.
pub fn rank_map(scores: &TickerMap<f64>, top_n: usize) -> RankedList {
    rank(scores.iter().map(|(t, s)| (t.clone(), *s)), top_n)
}

/// Rank composite breakdowns by their composite score.
pub fn rank_composite(breakdowns: &TickerMap<ScoreBreakdown>, top_n: usize) -> RankedList {
    rank(
        breakdowns.iter().map(|(t, b)| (t.clone(), b.composite)),
        top_n,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tickers(list: &RankedList) -> Vec<&str> {
        list.iter().map(|e| e.ticker.as_str()).collect()
    }

    #[test]
    fn sorts_descending_and_truncates() {
        let ranked = rank([("A", 0.1), ("B", 0.9), ("C", 0.5)], 2);
        assert_eq!(tickers(&ranked), ["B", "C"]);
    }

    #[test]
    fn top_n_larger_than_universe() {
        let ranked = rank([("A", 0.1), ("B", 0.9), ("C", 0.5)], 10);
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn zero_top_n_and_empty_input() {
        assert!(rank([("A", 1.0)], 0).is_empty());
        assert!(rank(Vec::<(String, f64)>::new(), 5).is_empty());
    }

    #[test]
    fn ties_keep_input_order() {
        let ranked = rank([("Z", 0.5), ("A", 0.5), ("M", 0.7)], 3);
        assert_eq!(tickers(&ranked), ["M", "Z", "A"]);
    }

    #[test]
    fn nan_sorts_last() {
        let ranked = rank([("N", f64::NAN), ("A", -1.0), ("B", 2.0)], 3);
        assert_eq!(tickers(&ranked), ["B", "A", "N"]);
    }

    #[test]
    fn idempotent() {
        let mut scores = TickerMap::new();
        for (t, s) in [("A", 0.3), ("B", 0.3), ("C", 0.8), ("D", -0.2)] {
            scores.insert(t.to_string(), s);
        }
        let first = rank_map(&scores, 4);
        let again = rank(first.iter().map(|e| (e.ticker.clone(), e.score)), 4);
        assert_eq!(first, again);
    }
}
