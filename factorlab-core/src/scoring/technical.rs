//! Technical factor — directional signals from the latest indicator values.
//!
//! | Signal       | Formula                               | Fallback                 |
//! |--------------|---------------------------------------|--------------------------|
//! | sma20        | (close - SMA20) / SMA20               | 0 if SMA20 <= 0          |
//! | sma50        | (close - SMA50) / SMA50               | 0 if SMA50 <= 0          |
//! | ema          | (EMA12 - EMA26) / EMA26               | 0 if EMA26 <= 0          |
//! | rsi          | piecewise, see [`rsi_signal`]         |                          |
//! | macd         | (MACD - signal) / abs(signal)         | 0 if signal == 0         |
//!
//! A signal whose indicator is still warming up is `None` and contributes 0
//! to the composite; it never excludes the ticker.

use super::{Omission, Scored};
use crate::domain::{PriceSeries, TickerMap};
use crate::indicators::frame::{
    EMA_12, EMA_26, MACD, MACD_HIST, MACD_SIGNAL, RSI_14, SMA_20, SMA_200, SMA_50,
};
use crate::indicators::IndicatorFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SMA20_WEIGHT: f64 = 0.20;
pub const SMA50_WEIGHT: f64 = 0.20;
pub const EMA_WEIGHT: f64 = 0.25;
pub const RSI_WEIGHT: f64 = 0.20;
pub const MACD_WEIGHT: f64 = 0.15;

/// Indicator values at the latest bar. `None` means still in warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub ema_12: Option<f64>,
    pub ema_26: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn from_frame(frame: &IndicatorFrame, close: f64) -> Self {
        Self {
            close,
            sma_20: frame.latest(SMA_20),
            sma_50: frame.latest(SMA_50),
            sma_200: frame.latest(SMA_200),
            ema_12: frame.latest(EMA_12),
            ema_26: frame.latest(EMA_26),
            rsi_14: frame.latest(RSI_14),
            macd: frame.latest(MACD),
            macd_signal: frame.latest(MACD_SIGNAL),
            macd_hist: frame.latest(MACD_HIST),
        }
    }
}

/// Per-signal scores. `None` = could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TechnicalSignals {
    pub sma20_signal: Option<f64>,
    pub sma50_signal: Option<f64>,
    pub ema_signal: Option<f64>,
    pub rsi_signal: Option<f64>,
    pub macd_signal: Option<f64>,
}

impl TechnicalSignals {
    pub fn from_snapshot(s: &IndicatorSnapshot) -> Self {
        Self {
            sma20_signal: s.sma_20.map(|sma| relative_gap(s.close, sma)),
            sma50_signal: s.sma_50.map(|sma| relative_gap(s.close, sma)),
            ema_signal: match (s.ema_12, s.ema_26) {
                (Some(fast), Some(slow)) => Some(relative_gap(fast, slow)),
                _ => None,
            },
            rsi_signal: s.rsi_14.map(rsi_signal),
            macd_signal: match (s.macd, s.macd_signal) {
                (Some(line), Some(signal)) => Some(macd_signal(line, signal)),
                _ => None,
            },
        }
    }

    /// Weighted composite, zero-filling any missing signal.
    pub fn composite(&self) -> f64 {
        self.sma20_signal.unwrap_or(0.0) * SMA20_WEIGHT
            + self.sma50_signal.unwrap_or(0.0) * SMA50_WEIGHT
            + self.ema_signal.unwrap_or(0.0) * EMA_WEIGHT
            + self.rsi_signal.unwrap_or(0.0) * RSI_WEIGHT
            + self.macd_signal.unwrap_or(0.0) * MACD_WEIGHT
    }
}

/// Full technical breakdown for one ticker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TechnicalBreakdown {
    pub indicators: IndicatorSnapshot,
    pub signals: TechnicalSignals,
    pub composite: f64,
}

/// (value - base) / base, or 0 when the base is not positive.
fn relative_gap(value: f64, base: f64) -> f64 {
    if base > 0.0 {
        (value - base) / base
    } else {
        0.0
    }
}

/// RSI mapped to a directional signal.
///
/// Inside [30, 70] (inclusive) the signal is (rsi - 50) / 50. Below 30 the
/// market is oversold: +0.5. Above 70 it is overbought: -0.3.
pub fn rsi_signal(rsi: f64) -> f64 {
    if (30.0..=70.0).contains(&rsi) {
        (rsi - 50.0) / 50.0
    } else if rsi < 30.0 {
        0.5
    } else {
        -0.3
    }
}

fn macd_signal(line: f64, signal: f64) -> f64 {
    if signal != 0.0 {
        (line - signal) / signal.abs()
    } else {
        0.0
    }
}

/// Technical breakdown for a single series.
pub fn technical_of(series: &PriceSeries) -> Result<TechnicalBreakdown, Omission> {
    let last = series.last().ok_or(Omission::NoPriceData)?;
    if !last.close.is_finite() {
        return Err(Omission::InvalidClose);
    }

    let frame = IndicatorFrame::derive(series);
    let indicators = IndicatorSnapshot::from_frame(&frame, last.close);
    let signals = TechnicalSignals::from_snapshot(&indicators);
    Ok(TechnicalBreakdown {
        indicators,
        signals,
        composite: signals.composite(),
    })
}

/// Technical breakdowns for every ticker, with omission reasons.
pub fn technical_detailed(series_by_ticker: &TickerMap<PriceSeries>) -> Scored<TechnicalBreakdown> {
    let mut out = Scored::new();
    for (ticker, series) in series_by_ticker {
        let outcome = technical_of(series);
        if let Err(reason) = &outcome {
            debug!(ticker = %ticker, %reason, "technical score omitted");
        }
        out.record(ticker, outcome);
    }
    out
}

/// Technical breakdown per ticker; tickers with no usable price data are absent.
pub fn technical(series_by_ticker: &TickerMap<PriceSeries>) -> TickerMap<TechnicalBreakdown> {
    technical_detailed(series_by_ticker).scores
}

/// Project breakdowns onto their composite score, the combiner's input.
pub fn technical_composites(breakdowns: &TickerMap<TechnicalBreakdown>) -> TickerMap<f64> {
    breakdowns
        .iter()
        .map(|(t, b)| (t.clone(), b.composite))
        .collect()
}
