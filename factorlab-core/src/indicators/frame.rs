//! Precomputed indicator series for one price series.
//!
//! Built once per ticker, then queried by name and bar index. Warm-up
//! positions (NaN) read back as `None`.
//!
//! Bars with a non-finite close are dropped before any indicator runs, so bar
//! indices count usable bars only.

use super::{Ema, Indicator, Macd, MacdLine, Rsi, Sma};
use crate::domain::{Bar, PriceSeries};
use std::collections::HashMap;

pub const SMA_20: &str = "sma_20";
pub const SMA_50: &str = "sma_50";
pub const SMA_200: &str = "sma_200";
pub const EMA_12: &str = "ema_12";
pub const EMA_26: &str = "ema_26";
pub const RSI_14: &str = "rsi_14";
pub const MACD: &str = "macd_line_12_26_9";
pub const MACD_SIGNAL: &str = "macd_signal_12_26_9";
pub const MACD_HIST: &str = "macd_hist_12_26_9";

/// Container for precomputed indicator values.
#[derive(Debug, Clone, Default)]
pub struct IndicatorFrame {
    len: usize,
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorFrame {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            series: HashMap::new(),
        }
    }

    /// Derive the standard indicator set from a price series:
    /// SMA 20/50/200, EMA 12/26, RSI 14 and MACD 12/26/9.
    pub fn derive(series: &PriceSeries) -> Self {
        Self::derive_bars(series.bars())
    }

    pub fn derive_bars(bars: &[Bar]) -> Self {
        let usable: Vec<Bar> = bars.iter().filter(|b| b.close.is_finite()).cloned().collect();
        let mut frame = Self::new(usable.len());
        let indicators: Vec<Box<dyn Indicator>> = vec![
            Box::new(Sma::new(20)),
            Box::new(Sma::new(50)),
            Box::new(Sma::new(200)),
            Box::new(Ema::new(12)),
            Box::new(Ema::new(26)),
            Box::new(Rsi::new(14)),
            Box::new(Macd::standard(MacdLine::Line)),
            Box::new(Macd::standard(MacdLine::Signal)),
            Box::new(Macd::standard(MacdLine::Histogram)),
        ];
        for indicator in &indicators {
            frame.insert_indicator(indicator.as_ref(), &usable);
        }
        frame
    }

    /// Compute an indicator and store it under its own name.
    pub fn insert_indicator(&mut self, indicator: &dyn Indicator, bars: &[Bar]) {
        self.insert(indicator.name().to_string(), indicator.compute(bars));
    }

    /// Insert a named indicator series.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    /// Defined value of an indicator at a bar index.
    pub fn get(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.series
            .get(name)
            .and_then(|v| v.get(bar_index).copied())
            .filter(|v| !v.is_nan())
    }

    /// Defined value of an indicator at the most recent bar.
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.len.checked_sub(1).and_then(|i| self.get(name, i))
    }

    /// Full series for a named indicator.
    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    /// Number of bars each series covers.
    pub fn bar_count(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn get_hides_warmup_nan() {
        let mut frame = IndicatorFrame::new(3);
        frame.insert("x", vec![f64::NAN, 1.0, 2.0]);
        assert_eq!(frame.get("x", 0), None);
        assert_eq!(frame.get("x", 1), Some(1.0));
        assert_eq!(frame.latest("x"), Some(2.0));
        assert_eq!(frame.get("x", 3), None);
        assert_eq!(frame.get("missing", 0), None);
    }

    #[test]
    fn derive_short_history_leaves_long_windows_absent() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();
        let frame = IndicatorFrame::derive_bars(&make_bars(&closes));
        assert!(frame.latest(SMA_20).is_some());
        assert!(frame.latest(SMA_50).is_some());
        assert!(frame.latest(SMA_200).is_none());
        assert!(frame.latest(EMA_26).is_some());
        assert!(frame.latest(RSI_14).is_some());
        assert!(frame.latest(MACD_SIGNAL).is_some());
        assert_eq!(frame.bar_count(), 60);
    }

    #[test]
    fn derive_skips_bars_with_bad_close() {
        let closes: Vec<f64> = (0..250).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let mut bars = make_bars(&closes);
        bars[10].close = f64::NAN;
        bars[120].close = f64::INFINITY;
        let frame = IndicatorFrame::derive_bars(&bars);

        assert_eq!(frame.bar_count(), 248);
        for name in [SMA_20, SMA_50, SMA_200, EMA_12, EMA_26, RSI_14, MACD, MACD_SIGNAL, MACD_HIST] {
            assert!(frame.latest(name).is_some(), "{name} lost after a bad close");
        }
    }

    #[test]
    fn macd_lines_match_standard_instances() {
        let closes: Vec<f64> = (0..60).map(|i| 50.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let frame = IndicatorFrame::derive_bars(&bars);
        let line = Macd::standard(MacdLine::Line).compute(&bars);
        assert_eq!(frame.latest(MACD), line.last().copied());
        assert_eq!(frame.get(MACD, 24), None);
    }

    #[test]
    fn derive_empty_series() {
        let frame = IndicatorFrame::derive_bars(&[]);
        assert_eq!(frame.latest(SMA_20), None);
        assert_eq!(frame.bar_count(), 0);
    }
}
