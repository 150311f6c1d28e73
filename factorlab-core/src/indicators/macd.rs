//! Moving Average Convergence Divergence (MACD).
//!
//! Three lines (separate Indicator instances):
//! - Line: EMA(close, fast) - EMA(close, slow)
//! - Signal: EMA(line, signal)
//! - Histogram: line - signal
//!
//! Lookback: slow - 1 for the line, slow + signal - 2 for signal and histogram.

use super::ema::ema_of_series;
use super::Indicator;
use crate::domain::Bar;

/// Which MACD output to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdLine {
    Line,
    Signal,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    line: MacdLine,
    name: String,
}

impl Macd {
    fn with_line(fast: usize, slow: usize, signal: usize, line: MacdLine, label: &str) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD periods must be >= 1");
        assert!(fast < slow, "MACD fast period must be below slow period");
        Self {
            fast,
            slow,
            signal,
            line,
            name: format!("macd_{label}_{fast}_{slow}_{signal}"),
        }
    }

    pub fn line(fast: usize, slow: usize, signal: usize) -> Self {
        Self::with_line(fast, slow, signal, MacdLine::Line, "line")
    }

    pub fn signal(fast: usize, slow: usize, signal: usize) -> Self {
        Self::with_line(fast, slow, signal, MacdLine::Signal, "signal")
    }

    pub fn histogram(fast: usize, slow: usize, signal: usize) -> Self {
        Self::with_line(fast, slow, signal, MacdLine::Histogram, "hist")
    }

    /// Standard 12/26/9 parameters.
    pub fn standard(line: MacdLine) -> Self {
        match line {
            MacdLine::Line => Self::line(12, 26, 9),
            MacdLine::Signal => Self::signal(12, 26, 9),
            MacdLine::Histogram => Self::histogram(12, 26, 9),
        }
    }
}

/// All three MACD series in one pass: (line, signal, histogram).
pub fn macd_series(closes: &[f64], fast: usize, slow: usize, signal: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let fast_ema = ema_of_series(closes, fast);
    let slow_ema = ema_of_series(closes, slow);
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_of_series(&line, signal);
    let histogram: Vec<f64> = line
        .iter()
        .zip(&signal_line)
        .map(|(l, s)| l - s)
        .collect();
    (line, signal_line, histogram)
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.line {
            MacdLine::Line => self.slow - 1,
            MacdLine::Signal | MacdLine::Histogram => self.slow + self.signal - 2,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let (line, signal, histogram) = macd_series(&closes, self.fast, self.slow, self.signal);
        match self.line {
            MacdLine::Line => line,
            MacdLine::Signal => signal,
            MacdLine::Histogram => histogram,
        }
    }
}
