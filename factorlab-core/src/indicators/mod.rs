//! Price indicators used by the technical factor.
//!
//! Every indicator is a pure function of a bar history producing a series of
//! the same length. Positions inside the warm-up window are `f64::NAN` and are
//! read back as absent through [`IndicatorFrame`].
//!
//! MACD has three outputs and is exposed as one named instance per line,
//! keeping the single-series `Indicator` trait unchanged.

pub mod ema;
pub mod frame;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use ema::{ema_of_series, Ema};
pub use frame::IndicatorFrame;
pub use macd::{Macd, MacdLine};
pub use rsi::Rsi;
pub use sma::Sma;

use crate::domain::Bar;

/// Trait for indicators.
///
/// The first `lookback()` values of `compute` are `f64::NAN` (warm-up).
/// No value at bar t may depend on bars after t.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "rsi_14").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
