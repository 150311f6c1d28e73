//! Alpha Vantage price source (TIME_SERIES_DAILY_ADJUSTED).
//!
//! The free tier allows 5 calls per minute, so requests are issued one at a
//! time with a fixed spacing. The adjusted close is used as the close.
//! London tickers (`BARC.L`) are tried as `BARC.LSE` first, then as `BARC`.

use super::provider::{report_outcome, DataError, DataSource, FetchProgress, PriceBatch, PriceSource};
use crate::domain::{Bar, Period, PriceSeries, Ticker};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub const API_KEY_ENV: &str = "ALPHA_VANTAGE_API_KEY";
const QUERY_URL: &str = "https://www.alphavantage.co/query";

#[derive(Debug, Deserialize)]
struct DailyResponse {
    #[serde(rename = "Time Series (Daily)")]
    series: Option<BTreeMap<String, DailyEntry>>,
    #[serde(rename = "Error Message")]
    error: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailyEntry {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. adjusted close")]
    adjusted_close: Option<String>,
    #[serde(rename = "6. volume")]
    volume: Option<String>,
}

pub struct AlphaVantageProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    spacing: Duration,
}

impl AlphaVantageProvider {
    /// `api_key` falls back to the `ALPHA_VANTAGE_API_KEY` environment variable.
    pub fn new(api_key: Option<String>) -> Result<Self, DataError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| {
                DataError::AuthenticationRequired(format!(
                    "Alpha Vantage API key required: set {API_KEY_ENV} or provider.api_key \
                     (free key at https://www.alphavantage.co/support/#api-key)"
                ))
            })?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            spacing: Duration::from_secs(12),
        })
    }

    /// Override the delay between calls (paid tiers allow more).
    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    /// "compact" returns the last 100 points; anything a year or longer needs "full".
    pub fn output_size(period: Period) -> &'static str {
        if period.is_long() {
            "full"
        } else {
            "compact"
        }
    }

    fn request(&self, symbol: &str, output_size: &str) -> Result<Vec<Bar>, DataError> {
        let resp = self
            .client
            .get(QUERY_URL)
            .query(&[
                ("function", "TIME_SERIES_DAILY_ADJUSTED"),
                ("symbol", symbol),
                ("outputsize", output_size),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(DataError::Other(format!("HTTP {} for {symbol}", resp.status())));
        }

        let body: DailyResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;
        parse_daily(symbol, body)
    }
}

/// Symbols to try for one ticker, in order.
pub(crate) fn candidate_symbols(ticker: &str) -> Vec<String> {
    match ticker.strip_suffix(".L") {
        Some(base) => vec![format!("{base}.LSE"), base.to_string()],
        None => vec![ticker.to_string()],
    }
}

fn parse_daily(symbol: &str, body: DailyResponse) -> Result<Vec<Bar>, DataError> {
    if let Some(msg) = body.note.or(body.information) {
        debug!(symbol, message = %msg, "alpha vantage throttled request");
        return Err(DataError::RateLimited {
            retry_after_secs: 60,
        });
    }
    if let Some(msg) = body.error {
        debug!(symbol, message = %msg, "alpha vantage rejected symbol");
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }
    let series = body.series.ok_or_else(|| {
        DataError::ResponseFormatChanged("missing 'Time Series (Daily)' object".into())
    })?;

    let num = |s: &str| s.trim().parse::<f64>().unwrap_or(f64::NAN);
    let mut bars = Vec::with_capacity(series.len());
    for (date, entry) in series {
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| DataError::ResponseFormatChanged(format!("bad date '{date}': {e}")))?;
        let close = entry
            .adjusted_close
            .as_deref()
            .map(num)
            .filter(|c| c.is_finite())
            .unwrap_or_else(|| num(&entry.close));
        bars.push(Bar {
            date,
            open: num(&entry.open),
            high: num(&entry.high),
            low: num(&entry.low),
            close,
            volume: entry
                .volume
                .as_deref()
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map_or(0, |v| v.max(0.0) as u64),
        });
    }
    Ok(bars)
}

impl PriceSource for AlphaVantageProvider {
    fn name(&self) -> &str {
        "alpha_vantage"
    }

    fn source(&self) -> DataSource {
        DataSource::AlphaVantage
    }

    fn fetch_with_progress(&self, tickers: &[Ticker], period: Period, progress: &dyn FetchProgress) -> PriceBatch {
        let end = chrono::Local::now().date_naive();
        let start = period.start_date(end);
        let output_size = Self::output_size(period);
        let total = tickers.len();
        let mut batch = PriceBatch::new();
        let mut calls = 0usize;

        for (i, ticker) in tickers.iter().enumerate() {
            progress.on_start(ticker, i, total);
            let mut outcome = Err(DataError::NoData {
                symbol: ticker.clone(),
            });
            for symbol in candidate_symbols(ticker) {
                if calls > 0 {
                    std::thread::sleep(self.spacing);
                }
                calls += 1;
                match self.request(&symbol, output_size) {
                    Ok(bars) => {
                        let bars = bars.into_iter().filter(|b| b.date >= start && b.date <= end).collect();
                        outcome = Ok(PriceSeries::new(ticker.as_str(), bars));
                        break;
                    }
                    Err(e) => {
                        debug!(ticker = %ticker, symbol = %symbol, error = %e, "alpha vantage attempt failed");
                        outcome = Err(e);
                    }
                }
            }
            report_outcome(progress, ticker, i, total, &outcome);
            batch.record(ticker, outcome);
        }

        progress.on_batch_complete(batch.series.len(), batch.failures.len(), total);
        batch
    }
}
