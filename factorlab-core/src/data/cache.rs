//! Parquet price cache with Hive-style partitioning.
//!
//! Layout: `{cache_dir}/symbol={TICKER}/{year}.parquet` plus a `meta.json`
//! sidecar per ticker (date range, bar count, BLAKE3 hash of the bars, source).
//!
//! Writes are atomic (write `.tmp`, rename into place). A file that fails
//! validation on load is renamed to `{file}.quarantined` and skipped.

use super::provider::{DataError, DataSource, FetchProgress, PriceBatch, PriceSource};
use crate::domain::{Bar, Period, PriceSeries, Ticker};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Slack allowed at either end of a cached range: weekends and holidays mean
/// the first and last bars rarely fall exactly on the requested dates.
pub const COVERAGE_GRACE_DAYS: i64 = 5;

const COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// Metadata sidecar for a cached ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: String,
    pub cached_at: chrono::NaiveDateTime,
}

pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("symbol={symbol}"))
    }

    fn year_path(&self, symbol: &str, year: i32) -> PathBuf {
        self.symbol_dir(symbol).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("meta.json")
    }

    /// Replace the cached history of `series.ticker()`, one file per year.
    pub fn write(&self, series: &PriceSeries, source: DataSource) -> Result<(), DataError> {
        let symbol = series.ticker();
        let bars = series.bars();
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            return Err(DataError::CacheError("no bars to cache".into()));
        };

        let sym_dir = self.symbol_dir(symbol);
        fs::create_dir_all(&sym_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        // Stale partitions from a previous, longer history
        if let Ok(entries) = fs::read_dir(&sym_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
                    let _ = fs::remove_file(&path);
                }
            }
        }

        let mut by_year: HashMap<i32, Vec<&Bar>> = HashMap::new();
        for bar in bars {
            by_year.entry(bar.date.year()).or_default().push(bar);
        }

        for (year, year_bars) in &by_year {
            let mut df = bars_to_dataframe(year_bars)?;
            let path = self.year_path(symbol, *year);
            let tmp_path = path.with_extension("parquet.tmp");

            write_parquet(&mut df, &tmp_path)?;

            fs::rename(&tmp_path, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                DataError::CacheError(format!("atomic rename failed: {e}"))
            })?;
        }

        let meta = CacheMeta {
            symbol: symbol.to_string(),
            start_date: first.date,
            end_date: last.date,
            bar_count: bars.len(),
            data_hash: blake3::hash(
                &serde_json::to_vec(bars)
                    .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            source: source.as_str().to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(symbol), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        debug!(symbol, bars = bars.len(), "cached price history");
        Ok(())
    }

    /// Load all cached bars for a ticker.
    pub fn load(&self, symbol: &str) -> Result<PriceSeries, DataError> {
        let sym_dir = self.symbol_dir(symbol);
        if !sym_dir.exists() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        let mut all_bars = Vec::new();
        let entries = fs::read_dir(&sym_dir).map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            let path = entry.path();

            // meta.json, .quarantined, .tmp
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }

            match load_and_validate_parquet(&path) {
                Ok(bars) => all_bars.extend(bars),
                Err(e) => {
                    let quarantine = path.with_extension("parquet.quarantined");
                    warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                    let _ = fs::rename(&path, &quarantine);
                }
            }
        }

        if all_bars.is_empty() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        Ok(PriceSeries::new(symbol, all_bars))
    }

    pub fn get_meta(&self, symbol: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Tickers that have a metadata sidecar, sorted.
    pub fn cached_symbols(&self) -> Vec<Ticker> {
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        let mut symbols: Vec<Ticker> = entries
            .flatten()
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.strip_prefix("symbol=").map(str::to_string)
            })
            .filter(|s| self.meta_path(s).exists())
            .collect();
        symbols.sort();
        symbols
    }

    pub fn status(&self, symbols: &[Ticker]) -> Vec<CacheStatus> {
        symbols
            .iter()
            .map(|sym| {
                let meta = self.get_meta(sym);
                CacheStatus {
                    symbol: sym.clone(),
                    cached: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.start_date),
                    end_date: meta.as_ref().map(|m| m.end_date),
                    bar_count: meta.as_ref().map(|m| m.bar_count),
                    source: meta.map(|m| m.source),
                }
            })
            .collect()
    }

    /// Whether the cached range covers `[start, end]`, give or take
    /// [`COVERAGE_GRACE_DAYS`] at each end.
    pub fn covers_range(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> CoverageResult {
        let grace = chrono::Duration::days(COVERAGE_GRACE_DAYS);
        match self.get_meta(symbol) {
            None => CoverageResult::NotCached,
            Some(meta) if meta.start_date <= start + grace && meta.end_date + grace >= end => {
                CoverageResult::FullyCovered
            }
            Some(meta) => CoverageResult::PartiallyCovered {
                cached_start: meta.start_date,
                cached_end: meta.end_date,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub symbol: String,
    pub cached: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bar_count: Option<usize>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoverageResult {
    NotCached,
    FullyCovered,
    PartiallyCovered {
        cached_start: NaiveDate,
        cached_end: NaiveDate,
    },
}

// ── Cache-through source ────────────────────────────────────────────

/// Serves tickers from the cache when it covers the period, fetches the rest
/// from `inner` and writes them back.
pub struct CachedPriceSource<S> {
    inner: S,
    cache: ParquetCache,
    end: Option<NaiveDate>,
}

impl<S: PriceSource> CachedPriceSource<S> {
    pub fn new(inner: S, cache: ParquetCache) -> Self {
        Self {
            inner,
            cache,
            end: None,
        }
    }

    /// Pin the coverage end date (defaults to today).
    pub fn ending_on(mut self, end: NaiveDate) -> Self {
        self.end = Some(end);
        self
    }

    pub fn cache(&self) -> &ParquetCache {
        &self.cache
    }
}

impl<S: PriceSource> PriceSource for CachedPriceSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn source(&self) -> DataSource {
        self.inner.source()
    }

    fn fetch_with_progress(&self, tickers: &[Ticker], period: Period, progress: &dyn FetchProgress) -> PriceBatch {
        let end = self.end.unwrap_or_else(|| chrono::Local::now().date_naive());
        let start = period.start_date(end);

        let mut batch = PriceBatch::new();
        let mut missing = Vec::new();
        for ticker in tickers {
            if self.cache.covers_range(ticker, start, end) != CoverageResult::FullyCovered {
                missing.push(ticker.clone());
                continue;
            }
            match self.cache.load(ticker) {
                Ok(series) => {
                    let bars = series.bars().iter().filter(|b| b.date >= start).cloned().collect();
                    batch.record(ticker, Ok(PriceSeries::new(ticker.as_str(), bars)));
                }
                Err(e) => {
                    debug!(ticker = %ticker, error = %e, "cache miss");
                    missing.push(ticker.clone());
                }
            }
        }
        info!(hits = batch.series.len(), misses = missing.len(), "price cache lookup");

        if !missing.is_empty() {
            let fetched = self.inner.fetch_with_progress(&missing, period, progress);
            for series in fetched.series.values() {
                if let Err(e) = self.cache.write(series, self.inner.source()) {
                    warn!(ticker = %series.ticker(), error = %e, "failed to cache series");
                }
            }
            batch.merge(fetched);
        }
        batch
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn bars_to_dataframe(bars: &[&Bar]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch()).num_days() as i32)
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file = fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::CacheError("empty parquet file".into()));
    }
    for col_name in COLUMNS {
        if df.column(col_name).is_err() {
            return Err(DataError::CacheError(format!("missing column '{col_name}'")));
        }
    }

    dataframe_to_bars(&df)
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, DataError> {
    let col = |name: &str| {
        df.column(name)
            .map_err(|e| DataError::ParquetError(format!("column read: {e}")))
    };
    let type_err = |name: &str, e: PolarsError| DataError::ParquetError(format!("{name} column type: {e}"));

    let dates = col("date")?;
    let opens = col("open")?;
    let highs = col("high")?;
    let lows = col("low")?;
    let closes = col("close")?;
    let volumes = col("volume")?;

    let date_ca = dates.date().map_err(|e| type_err("date", e))?;
    let open_ca = opens.f64().map_err(|e| type_err("open", e))?;
    let high_ca = highs.f64().map_err(|e| type_err("high", e))?;
    let low_ca = lows.f64().map_err(|e| type_err("low", e))?;
    let close_ca = closes.f64().map_err(|e| type_err("close", e))?;
    let vol_ca = volumes.u64().map_err(|e| type_err("volume", e))?;

    let n = df.height();
    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        bars.push(Bar {
            date: epoch() + chrono::Duration::days(days as i64),
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0),
        });
    }
    Ok(bars)
}
