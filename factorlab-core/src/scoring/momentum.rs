//! Momentum factor — trailing-window percentage price change.
//!
//! momentum = (close[last] - close[last - w]) / close[last - w]
//!
//! A series needs `w + 1` bars so that `close[last - w]` exists. Shorter
//! series, and series whose referenced closes are non-finite or whose base
//! close is not positive, are omitted rather than scored as zero.

use super::{Omission, Scored};
use crate::domain::{PriceSeries, TickerMap};
use tracing::debug;

/// Momentum of a single series over `window` bars.
pub fn momentum_of(series: &PriceSeries, window: usize) -> Result<f64, Omission> {
    if series.is_empty() {
        return Err(Omission::NoPriceData);
    }
    let required = window + 1;
    if window == 0 || series.len() < required {
        return Err(Omission::InsufficientHistory {
            bars: series.len(),
            required,
        });
    }

    let (Some(end), Some(start)) = (series.close_back(0), series.close_back(window)) else {
        return Err(Omission::InsufficientHistory {
            bars: series.len(),
            required,
        });
    };
    if !end.is_finite() || !start.is_finite() || start <= 0.0 {
        return Err(Omission::InvalidClose);
    }

    Ok((end - start) / start)
}

/// Momentum for every ticker, with omission reasons.
pub fn momentum_detailed(series_by_ticker: &TickerMap<PriceSeries>, window: usize) -> Scored<f64> {
    let mut out = Scored::new();
    for (ticker, series) in series_by_ticker {
        let outcome = momentum_of(series, window);
        if let Err(reason) = &outcome {
            debug!(ticker = %ticker, window, %reason, "momentum omitted");
        }
        out.record(ticker, outcome);
    }
    out
}

/// Raw momentum ratio per ticker; tickers that cannot be scored are absent.
pub fn momentum(series_by_ticker: &TickerMap<PriceSeries>, window: usize) -> TickerMap<f64> {
    momentum_detailed(series_by_ticker, window).scores
}
