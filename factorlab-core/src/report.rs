//! Screen report: everything a screen computed, ready for export.
//!
//! A report keeps the full audit trail (raw factor values, normalized
//! intermediates, per-signal and per-metric scores) next to the ranked list.

use crate::domain::{Market, Period, Ticker, TickerMap};
use crate::fingerprint::{ConfigHash, DatasetHash};
use crate::scoring::{
    CrossSectionStats, FundamentalBreakdown, Omission, RankedList, ScoreBreakdown,
    TechnicalBreakdown, Weights,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("json export: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv export: {0}")]
    Csv(#[from] csv::Error),
    #[error("export I/O: {0}")]
    Io(#[from] io::Error),
}

/// Per-ticker detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerReport {
    /// `None` when momentum was omitted (see `ScreenReport::momentum_omitted`).
    pub momentum: Option<f64>,
    pub technical: Option<TechnicalBreakdown>,
    pub fundamental: Option<FundamentalBreakdown>,
    pub score: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenReport {
    pub generated_at: chrono::NaiveDateTime,
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
    pub market: Market,
    pub period: Period,
    pub momentum_window: usize,
    pub top_n: usize,
    /// Weights the combiner used, after any normalization.
    pub weights: Weights,
    pub requested: Vec<Ticker>,
    /// Tickers the price source returned nothing for, with the reason.
    pub price_failures: TickerMap<String>,
    pub momentum_omitted: TickerMap<Omission>,
    pub technical_omitted: TickerMap<Omission>,
    pub tickers: TickerMap<TickerReport>,
    /// Reported for context; scoring uses fixed thresholds.
    pub cross_section: CrossSectionStats,
    pub ranked: RankedList,
}

const CSV_HEADER: [&str; 14] = [
    "rank",
    "ticker",
    "composite",
    "momentum",
    "technical",
    "fundamental",
    "norm_momentum",
    "norm_technical",
    "rsi_14",
    "sma20_signal",
    "macd_signal",
    "pe_ratio",
    "dividend_yield",
    "roe",
];

fn opt(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

impl ScreenReport {
    pub fn scored_count(&self) -> usize {
        self.tickers.len()
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One row per ranked ticker.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(CSV_HEADER)?;
        for (i, entry) in self.ranked.iter().enumerate() {
            let Some(detail) = self.tickers.get(&entry.ticker) else {
                continue;
            };
            let tech = detail.technical.as_ref();
            let fund = detail.fundamental.as_ref();
            csv.write_record([
                (i + 1).to_string(),
                entry.ticker.clone(),
                detail.score.composite.to_string(),
                detail.score.momentum.to_string(),
                detail.score.technical.to_string(),
                detail.score.fundamental.to_string(),
                detail.score.norm_momentum.to_string(),
                detail.score.norm_technical.to_string(),
                opt(tech.and_then(|t| t.indicators.rsi_14)),
                opt(tech.and_then(|t| t.signals.sma20_signal)),
                opt(tech.and_then(|t| t.signals.macd_signal)),
                opt(fund.and_then(|f| f.metrics.pe_ratio)),
                opt(fund.and_then(|f| f.metrics.dividend_yield)),
                opt(fund.and_then(|f| f.metrics.roe)),
            ])?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn to_csv(&self) -> Result<String, ExportError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Plain-text ranking table.
    pub fn to_table(&self) -> String {
        let info = self.market.info();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Top {} by composite score ({} {}, {}, {}-day momentum)",
            self.top_n,
            info.name,
            info.currency_symbol,
            self.period,
            self.momentum_window
        );
        let _ = writeln!(
            out,
            "{:>4}  {:<10} {:>9} {:>9} {:>9} {:>11}",
            "Rank", "Ticker", "Composite", "Momentum", "Technical", "Fundamental"
        );
        for (i, entry) in self.ranked.iter().enumerate() {
            let Some(detail) = self.tickers.get(&entry.ticker) else {
                continue;
            };
            let s = &detail.score;
            let _ = writeln!(
                out,
                "{:>4}  {:<10} {:>9.3} {:>8.2}% {:>9.3} {:>11.3}",
                i + 1,
                entry.ticker,
                s.composite,
                s.momentum * 100.0,
                s.technical,
                s.fundamental
            );
        }
        let skipped = self.price_failures.len();
        if skipped > 0 {
            let _ = writeln!(
                out,
                "\n{} of {} tickers had no price data: {}",
                skipped,
                self.requested.len(),
                self.price_failures.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        }
        let _ = writeln!(out, "config {}", self.config_hash.short());
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ScreenConfig;
    use crate::data::{DataError, PriceBatch};
    use crate::domain::TickerMap;
    use crate::pipeline::score_batch;
    use crate::scoring::make_series;

    fn report() -> super::ScreenReport {
        let mut batch = PriceBatch::new();
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + i as f64).collect();
        batch.record("A", Ok(make_series("A", &closes)));
        batch.record("B", Err(DataError::SymbolNotFound { symbol: "B".into() }));
        let requested = vec!["A".to_string(), "B".to_string()];
        score_batch(&requested, batch, TickerMap::new(), &ScreenConfig::default()).unwrap()
    }

    #[test]
    fn csv_has_header_and_one_row_per_rank() {
        let csv = report().to_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].split(',').count(), super::CSV_HEADER.len());
        assert!(lines[1].starts_with("1,A,"));
    }

    #[test]
    fn table_lists_missing_tickers() {
        let table = report().to_table();
        assert!(table.contains("1 of 2 tickers had no price data: B"));
    }

    #[test]
    fn absent_metrics_export_as_empty_cells() {
        let csv = report().to_csv().unwrap();
        // No fundamentals: the last three columns are blank.
        assert!(csv.lines().nth(1).unwrap().ends_with(",,,"));
    }
}
