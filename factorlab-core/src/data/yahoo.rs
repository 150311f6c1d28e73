//! Yahoo Finance sources: daily prices from the v8 chart API and fundamentals
//! from the v10 quoteSummary API.
//!
//! Yahoo has no official API and is subject to unannounced format changes.
//! Both sources share one HTTP client, retry policy and circuit breaker.
//! `CsvPriceSource` and `CsvFundamentals` are the offline fallbacks.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{
    report_outcome, DataError, DataSource, FetchProgress, FundamentalsSource, PriceBatch,
    PriceSource,
};
use crate::domain::{Bar, FundamentalSnapshot, Period, PriceSeries, Ticker, TickerMap};
use chrono::{NaiveDate, NaiveTime};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const CHART_BASE: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const SUMMARY_BASE: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const SUMMARY_MODULES: &str = "summaryDetail,defaultKeyStatistics,financialData";

// ── v8 chart response ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

// ── v10 quoteSummary response ───────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    quote_summary: SummaryResult,
}

#[derive(Debug, Deserialize)]
struct SummaryResult {
    result: Option<Vec<Value>>,
    error: Option<ApiError>,
}

// ── HTTP client with retry + circuit breaker ────────────────────────

/// Blocking HTTP client shared by the Yahoo sources.
pub struct YahooClient {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooClient {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// GET `url` and decode the JSON body, retrying transient failures with
    /// exponential backoff.
    fn get_json<T: DeserializeOwned>(&self, url: &str, symbol: &str) -> Result<T, DataError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                // IP ban
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(DataError::AuthenticationRequired(
                    "Yahoo Finance requires authentication".into(),
                ));
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let body = resp.json::<T>().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
            })?;
            self.circuit_breaker.record_success();
            return Ok(body);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

// ── Prices ──────────────────────────────────────────────────────────

/// Yahoo Finance price source. Tickers are fetched in parallel.
pub struct YahooProvider {
    http: Arc<YahooClient>,
    max_parallel: usize,
}

impl YahooProvider {
    pub fn new(http: Arc<YahooClient>) -> Self {
        Self {
            http,
            max_parallel: 4,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let end_ts = (end + chrono::Duration::days(1)).and_time(NaiveTime::MIN).and_utc().timestamp();
        format!(
            "{CHART_BASE}/{symbol}?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }

    fn fetch_one(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceSeries, DataError> {
        let chart: ChartResponse = self.http.get_json(&Self::chart_url(symbol, start, end), symbol)?;
        let bars = parse_chart(symbol, chart)?;
        Ok(PriceSeries::new(symbol, bars))
    }
}

/// Convert a chart response into bars.
///
/// Prices are split/dividend adjusted: when an adjusted close is present the
/// whole bar is rescaled by `adjclose / close`.
fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<Vec<Bar>, DataError> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(err) => DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
        None => DataError::ResponseFormatChanged("empty result with no error".into()),
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

    let timestamps = data.timestamp.ok_or_else(|| DataError::NoData {
        symbol: symbol.to_string(),
    })?;

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let mut bars = Vec::with_capacity(timestamps.len());

    for (i, &ts) in timestamps.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();
        let adj_close = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());

        // Holidays / non-trading days
        if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
            continue;
        }

        let factor = match (close, adj_close) {
            (Some(c), Some(a)) if c > 0.0 && a.is_finite() => a / c,
            _ => 1.0,
        };
        let scaled = |v: Option<f64>| v.map_or(f64::NAN, |v| v * factor);

        bars.push(Bar {
            date,
            open: scaled(open),
            high: scaled(high),
            low: scaled(low),
            close: scaled(close),
            volume: volume.unwrap_or(0),
        });
    }

    if bars.is_empty() {
        return Err(DataError::NoData {
            symbol: symbol.to_string(),
        });
    }

    Ok(bars)
}

impl PriceSource for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn source(&self) -> DataSource {
        DataSource::YahooFinance
    }

    fn fetch_with_progress(&self, tickers: &[Ticker], period: Period, progress: &dyn FetchProgress) -> PriceBatch {
        let end = chrono::Local::now().date_naive();
        let start = period.start_date(end);
        let total = tickers.len();

        let run = || {
            tickers
                .par_iter()
                .enumerate()
                .map(|(i, ticker)| {
                    progress.on_start(ticker, i, total);
                    let outcome = self.fetch_one(ticker, start, end);
                    report_outcome(progress, ticker, i, total, &outcome);
                    (ticker.clone(), outcome)
                })
                .collect::<Vec<_>>()
        };

        let results = match rayon::ThreadPoolBuilder::new().num_threads(self.max_parallel).build() {
            Ok(pool) => pool.install(run),
            Err(e) => {
                debug!(error = %e, "falling back to global rayon pool");
                run()
            }
        };

        let mut batch = PriceBatch::new();
        for (ticker, outcome) in results {
            batch.record(&ticker, outcome);
        }
        progress.on_batch_complete(batch.series.len(), batch.failures.len(), total);
        batch
    }
}

// ── Fundamentals ────────────────────────────────────────────────────

/// Yahoo Finance fundamentals via quoteSummary.
pub struct YahooFundamentals {
    http: Arc<YahooClient>,
}

impl YahooFundamentals {
    pub fn new(http: Arc<YahooClient>) -> Self {
        Self { http }
    }

    fn summary_url(symbol: &str) -> String {
        format!("{SUMMARY_BASE}/{symbol}?modules={SUMMARY_MODULES}")
    }

    fn fetch_one(&self, symbol: &str) -> Result<FundamentalSnapshot, DataError> {
        let resp: SummaryResponse = self.http.get_json(&Self::summary_url(symbol), symbol)?;
        let result = match (resp.quote_summary.result, resp.quote_summary.error) {
            (Some(r), _) => r,
            (None, Some(err)) => {
                return Err(DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)))
            }
            (None, None) => return Err(DataError::NoData { symbol: symbol.to_string() }),
        };
        let summary = result.into_iter().next().ok_or_else(|| DataError::NoData {
            symbol: symbol.to_string(),
        })?;
        Ok(snapshot_from_summary(&summary))
    }
}

/// Numeric field of a quoteSummary module. Yahoo wraps numbers as
/// `{"raw": 1.2, "fmt": "1.20"}`; an empty object means "not available".
fn summary_number(summary: &Value, module: &str, field: &str) -> Option<f64> {
    let value = summary.get(module)?.get(field)?;
    let raw = match value {
        Value::Object(obj) => obj.get("raw")?.as_f64(),
        other => other.as_f64(),
    }?;
    raw.is_finite().then_some(raw)
}

/// Map a quoteSummary result onto a snapshot, converting fractions to percent.
pub(crate) fn snapshot_from_summary(summary: &Value) -> FundamentalSnapshot {
    let n = |module: &str, field: &str| summary_number(summary, module, field);

    let pe_ratio = n("summaryDetail", "trailingPE")
        .or_else(|| n("summaryDetail", "forwardPE"))
        .or_else(|| n("defaultKeyStatistics", "forwardPE"));

    // Some tickers report percent already
    let dividend_yield = n("summaryDetail", "dividendYield").map(|y| if y < 1.0 { y * 100.0 } else { y });

    let profit_margin = n("financialData", "profitMargins")
        .or_else(|| n("defaultKeyStatistics", "profitMargins"))
        .map(|m| m * 100.0);

    FundamentalSnapshot {
        pe_ratio,
        dividend_yield,
        price_to_book: n("defaultKeyStatistics", "priceToBook"),
        roe: n("financialData", "returnOnEquity").map(|r| r * 100.0),
        market_cap: n("summaryDetail", "marketCap"),
        profit_margin,
        debt_to_equity: n("financialData", "debtToEquity"),
    }
}

impl FundamentalsSource for YahooFundamentals {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, tickers: &[Ticker]) -> TickerMap<FundamentalSnapshot> {
        tickers
            .iter()
            .map(|ticker| {
                let snapshot = self.fetch_one(ticker).unwrap_or_else(|e| {
                    warn!(ticker = %ticker, error = %e, "fundamentals fetch failed, using empty snapshot");
                    FundamentalSnapshot::empty()
                });
                (ticker.clone(), snapshot)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    fn chart(json: &str) -> ChartResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_chart_and_skips_holidays() {
        let resp = chart(
            r#"{"chart":{"result":[{"timestamp":[1704186000,1704272400,1704358800],
            "indicators":{"quote":[{"open":[100.0,null,102.0],"high":[101.0,null,103.0],
            "low":[99.0,null,101.0],"close":[100.5,null,102.5],"volume":[1000,null,1200]}]}}],
            "error":null}}"#,
        );
        let bars = parse_chart("BARC.L", resp).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 100.5);
        assert_eq!(bars[1].volume, 1200);
    }

    #[test]
    fn adjusted_close_rescales_bar() {
        let resp = chart(
            r#"{"chart":{"result":[{"timestamp":[1704186000],
            "indicators":{"quote":[{"open":[100.0],"high":[110.0],"low":[90.0],"close":[100.0],"volume":[5]}],
            "adjclose":[{"adjclose":[50.0]}]}}],"error":null}}"#,
        );
        let bars = parse_chart("X", resp).unwrap();
        assert_eq!((bars[0].open, bars[0].high, bars[0].close), (50.0, 55.0, 50.0));
    }

    #[test]
    fn chart_not_found_maps_to_symbol_not_found() {
        let resp = chart(r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#);
        assert!(matches!(parse_chart("NOPE.L", resp), Err(DataError::SymbolNotFound { .. })));
    }

    #[test]
    fn summary_converts_fractions_to_percent() {
        let summary: Value = serde_json::from_str(
            r#"{"summaryDetail":{"trailingPE":{"raw":14.2,"fmt":"14.20"},"dividendYield":{"raw":0.045},
                "marketCap":{"raw":3.1e10}},
               "defaultKeyStatistics":{"priceToBook":{"raw":0.8}},
               "financialData":{"returnOnEquity":{"raw":0.18},"profitMargins":{"raw":0.25},
                "debtToEquity":{"raw":120.5}}}"#,
        )
        .unwrap();
        let s = snapshot_from_summary(&summary);
        assert_eq!(s.pe_ratio, Some(14.2));
        assert_approx(s.dividend_yield.unwrap(), 4.5, 1e-9);
        assert_approx(s.roe.unwrap(), 18.0, 1e-9);
        assert_approx(s.profit_margin.unwrap(), 25.0, 1e-9);
        assert_eq!(s.price_to_book, Some(0.8));
        assert_eq!(s.debt_to_equity, Some(120.5));
        assert_eq!(s.market_cap, Some(3.1e10));
    }

    #[test]
    fn summary_falls_back_to_forward_pe() {
        let summary: Value = serde_json::from_str(
            r#"{"summaryDetail":{"trailingPE":{},"forwardPE":{"raw":21.0},"dividendYield":{"raw":3.2}}}"#,
        )
        .unwrap();
        let s = snapshot_from_summary(&summary);
        assert_eq!(s.pe_ratio, Some(21.0));
        assert_eq!(s.dividend_yield, Some(3.2));
        assert_eq!(s.roe, None);
    }

    #[test]
    fn chart_url_covers_end_date() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let url = YahooProvider::chart_url("HSBA.L", start, end);
        assert!(url.contains("HSBA.L"));
        assert!(url.contains("period1=1704067200"));
        assert!(url.contains("period2=1704240000"));
    }
}
