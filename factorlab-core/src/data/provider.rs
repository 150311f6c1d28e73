//! Data source traits and structured error types.
//!
//! The scoring engine never talks to a network or filesystem itself. Prices and
//! fundamentals arrive through the two narrow traits defined here, so any source
//! (Yahoo, Alpha Vantage, CSV, synthetic, a cache) can be swapped in or mocked.

use crate::domain::{FundamentalSnapshot, Period, PriceSeries, Ticker, TickerMap};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Structured error types for data operations.
///
/// A `DataError` is always scoped to one ticker (or one request). It is recorded
/// in [`PriceBatch::failures`] and never aborts the batch.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no data returned for {symbol}")]
    NoData { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("csv error: {0}")]
    CsvError(String),

    #[error("no cached data for symbol '{symbol}'")]
    NoCachedData { symbol: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    YahooFinance,
    AlphaVantage,
    Csv,
    Synthetic,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::YahooFinance => "yahoo_finance",
            DataSource::AlphaVantage => "alpha_vantage",
            DataSource::Csv => "csv",
            DataSource::Synthetic => "synthetic",
        }
    }
}

/// Result of a multi-ticker price fetch.
///
/// `series` holds only tickers that produced at least one bar. Every requested
/// ticker that did not is listed in `failures` with the reason.
#[derive(Debug, Default)]
pub struct PriceBatch {
    pub series: TickerMap<PriceSeries>,
    pub failures: TickerMap<DataError>,
}

impl PriceBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// File one ticker's outcome. An empty series counts as a failure.
    pub fn record(&mut self, ticker: &str, outcome: Result<PriceSeries, DataError>) {
        match outcome {
            Ok(series) if !series.is_empty() => {
                self.series.insert(ticker.to_string(), series);
            }
            Ok(_) => {
                self.failures.insert(
                    ticker.to_string(),
                    DataError::NoData {
                        symbol: ticker.to_string(),
                    },
                );
            }
            Err(e) => {
                warn!(ticker, error = %e, "price fetch failed");
                self.failures.insert(ticker.to_string(), e);
            }
        }
    }

    /// Fold another batch into this one. Successful series win over failures.
    pub fn merge(&mut self, other: PriceBatch) {
        for (ticker, series) in other.series {
            self.failures.remove(&ticker);
            self.series.insert(ticker, series);
        }
        for (ticker, err) in other.failures {
            if !self.series.contains_key(&ticker) {
                self.failures.insert(ticker, err);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Source of daily price history.
///
/// Implementations handle the specifics of one provider. Caching sits above
/// this trait: sources don't know about the cache.
pub trait PriceSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn source(&self) -> DataSource;

    /// Fetch history for every ticker, reporting per-ticker progress.
    fn fetch_with_progress(
        &self,
        tickers: &[Ticker],
        period: Period,
        progress: &dyn FetchProgress,
    ) -> PriceBatch;

    /// Fetch history for every ticker.
    fn fetch(&self, tickers: &[Ticker], period: Period) -> PriceBatch {
        self.fetch_with_progress(tickers, period, &SilentProgress)
    }
}

/// Source of fundamental snapshots.
///
/// Never fails per ticker: a ticker whose lookup fails gets an empty snapshot,
/// so the output always has exactly the requested tickers.
pub trait FundamentalsSource: Send + Sync {
    fn name(&self) -> &str;

    fn fetch(&self, tickers: &[Ticker]) -> TickerMap<FundamentalSnapshot>;
}

/// Fundamentals source that knows nothing; every ticker scores neutral.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFundamentals;

impl FundamentalsSource for NoFundamentals {
    fn name(&self) -> &str {
        "none"
    }

    fn fetch(&self, tickers: &[Ticker]) -> TickerMap<FundamentalSnapshot> {
        tickers
            .iter()
            .map(|t| (t.clone(), FundamentalSnapshot::empty()))
            .collect()
    }
}

/// Progress callback for multi-ticker fetches.
///
/// Sources may fetch in parallel, so callbacks can arrive from several
/// threads and out of index order.
pub trait FetchProgress: Send + Sync {
    /// Called when starting to fetch a ticker.
    fn on_start(&self, ticker: &str, index: usize, total: usize);

    /// Called when a ticker fetch completes, with the bar count on success.
    fn on_complete(&self, ticker: &str, index: usize, total: usize, outcome: Result<usize, &DataError>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {ticker}...", index + 1, total);
    }

    fn on_complete(&self, ticker: &str, _index: usize, _total: usize, outcome: Result<usize, &DataError>) {
        match outcome {
            Ok(bars) => println!("  OK: {ticker} ({bars} bars)"),
            Err(e) => println!("  FAIL: {ticker}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nFetch complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Progress reporter that discards everything.
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_start(&self, _ticker: &str, _index: usize, _total: usize) {}

    fn on_complete(&self, _ticker: &str, _index: usize, _total: usize, _outcome: Result<usize, &DataError>) {}

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}

/// Report one finished ticker to `progress`.
pub(crate) fn report_outcome(
    progress: &dyn FetchProgress,
    ticker: &str,
    index: usize,
    total: usize,
    outcome: &Result<PriceSeries, DataError>,
) {
    progress.on_complete(ticker, index, total, outcome.as_ref().map(|s| s.len()));
}
