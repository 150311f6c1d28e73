//! Weighted composite of the three factors.

use crate::domain::{Ticker, TickerMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Factor weights. Applied as given; see [`Weights::normalized`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub momentum: f64,
    pub technical: f64,
    pub fundamental: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            momentum: 0.4,
            technical: 0.35,
            fundamental: 0.25,
        }
    }
}

impl Weights {
    pub fn new(momentum: f64, technical: f64, fundamental: f64) -> Self {
        Self {
            momentum,
            technical,
            fundamental,
        }
    }

    pub fn sum(&self) -> f64 {
        self.momentum + self.technical + self.fundamental
    }

    /// Rescale so the weights sum to 1. `None` if the sum is not positive.
    pub fn normalized(&self) -> Option<Self> {
        let total = self.sum();
        if !total.is_finite() || total <= 0.0 {
            return None;
        }
        Some(Self::new(
            self.momentum / total,
            self.technical / total,
            self.fundamental / total,
        ))
    }
}

/// Map raw momentum (a fractional return) onto [0, 1].
pub fn normalize_momentum(momentum: f64) -> f64 {
    (momentum.clamp(-1.0, 1.0) + 1.0) / 2.0
}

/// Map a technical composite (nominally [-1, 1]) onto [0, 1].
pub fn normalize_technical(technical: f64) -> f64 {
    ((technical + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Every input and intermediate of one ticker's composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub momentum: f64,
    pub technical: f64,
    pub fundamental: f64,
    pub norm_momentum: f64,
    pub norm_technical: f64,
    pub composite: f64,
}

impl ScoreBreakdown {
    pub fn combine(momentum: f64, technical: f64, fundamental: f64, weights: &Weights) -> Self {
        let mut breakdown = Self {
            momentum,
            technical,
            fundamental,
            norm_momentum: normalize_momentum(momentum),
            norm_technical: normalize_technical(technical),
            composite: 0.0,
        };
        breakdown.recompute(weights);
        breakdown
    }

    /// Recompute the composite from the stored intermediates.
    pub fn recompute(&mut self, weights: &Weights) {
        self.composite = self.norm_momentum * weights.momentum
            + self.norm_technical * weights.technical
            + self.fundamental * weights.fundamental;
    }
}

fn factor_value(map: &TickerMap<f64>, ticker: &str, factor: &str) -> f64 {
    match map.get(ticker) {
        Some(v) if v.is_finite() => *v,
        Some(v) => {
            debug!(ticker, factor, value = %v, "non-finite factor value, using 0");
            0.0
        }
        None => 0.0,
    }
}

/// Combine the three factor maps over the union of their tickers.
///
/// A ticker missing from a map contributes 0.0 for that factor.
pub fn composite(
    momentum: &TickerMap<f64>,
    technical: &TickerMap<f64>,
    fundamental: &TickerMap<f64>,
    weights: &Weights,
) -> TickerMap<ScoreBreakdown> {
    let universe: BTreeSet<&Ticker> = momentum
        .keys()
        .chain(technical.keys())
        .chain(fundamental.keys())
        .collect();

    universe
        .into_iter()
        .map(|ticker| {
            let breakdown = ScoreBreakdown::combine(
                factor_value(momentum, ticker, "momentum"),
                factor_value(technical, ticker, "technical"),
                factor_value(fundamental, ticker, "fundamental"),
                weights,
            );
            (ticker.clone(), breakdown)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    fn map(entries: &[(&str, f64)]) -> TickerMap<f64> {
        entries.iter().map(|(t, v)| (t.to_string(), *v)).collect()
    }

    #[test]
    fn worked_example() {
        let out = composite(
            &map(&[("A", 0.2)]),
            &map(&[("A", 0.0)]),
            &map(&[("A", 0.6)]),
            &Weights::default(),
        );
        let a = out["A"];
        assert_approx(a.norm_momentum, 0.6, 1e-12);
        assert_approx(a.norm_technical, 0.5, 1e-12);
        assert_approx(a.composite, 0.565, 1e-12);
    }

    #[test]
    fn union_of_keys_zero_fills() {
        let out = composite(
            &map(&[("A", 0.5)]),
            &map(&[("B", 0.2)]),
            &map(&[("C", 0.44)]),
            &Weights::default(),
        );
        assert_eq!(out.keys().collect::<Vec<_>>(), ["A", "B", "C"]);
        let c = out["C"];
        assert_eq!((c.momentum, c.technical), (0.0, 0.0));
        assert_approx(c.composite, 0.5 * 0.4 + 0.5 * 0.35 + 0.44 * 0.25, 1e-12);
    }

    #[test]
    fn normalizers_clamp() {
        assert_eq!(normalize_momentum(3.0), 1.0);
        assert_eq!(normalize_momentum(-2.0), 0.0);
        assert_eq!(normalize_technical(5.0), 1.0);
        assert_eq!(normalize_technical(-5.0), 0.0);
    }

    #[test]
    fn non_finite_inputs_become_zero() {
        let out = composite(
            &map(&[("A", f64::NAN)]),
            &map(&[("A", f64::INFINITY)]),
            &map(&[]),
            &Weights::default(),
        );
        assert_approx(out["A"].composite, 0.5 * 0.4 + 0.5 * 0.35, 1e-12);
    }

    #[test]
    fn weights_are_not_renormalized() {
        let w = Weights::new(1.0, 1.0, 1.0);
        let out = composite(&map(&[("A", 1.0)]), &map(&[("A", 1.0)]), &map(&[("A", 1.0)]), &w);
        assert_approx(out["A"].composite, 3.0, 1e-12);

        let n = w.normalized().unwrap();
        assert_approx(n.sum(), 1.0, 1e-12);
        assert!(Weights::new(0.0, 0.0, 0.0).normalized().is_none());
    }

    #[test]
    fn recompute_with_new_weights() {
        let mut b = ScoreBreakdown::combine(0.2, 0.0, 0.6, &Weights::default());
        b.recompute(&Weights::new(1.0, 0.0, 0.0));
        assert_approx(b.composite, 0.6, 1e-12);
    }
}
