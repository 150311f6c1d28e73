//! CSV sources for offline runs.
//!
//! Prices: one `<TICKER>.csv` per ticker in a directory, columns
//! `Date,Open,High,Low,Close,Volume` (header match is case-insensitive, extra
//! columns are ignored, empty cells read as missing).
//!
//! Fundamentals: one file with a `ticker` column plus any of the metric columns
//! (`pe_ratio`, `dividend_yield`, `price_to_book`, `roe`, ...). Percent metrics
//! are expected in percent.

use super::provider::{
    report_outcome, DataError, DataSource, FetchProgress, FundamentalsSource, PriceBatch,
    PriceSource,
};
use crate::domain::{Bar, FundamentalMetric, FundamentalSnapshot, Period, PriceSeries, Ticker, TickerMap};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PRICE_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// Reads `<dir>/<TICKER>.csv`.
pub struct CsvPriceSource {
    dir: PathBuf,
    /// Trim history to the requested period, counted back from the last bar.
    clip_to_period: bool,
}

impl CsvPriceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            clip_to_period: true,
        }
    }

    pub fn keep_full_history(mut self) -> Self {
        self.clip_to_period = false;
        self
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{ticker}.csv"))
    }

    fn load(&self, ticker: &str, period: Period) -> Result<PriceSeries, DataError> {
        let path = self.path_for(ticker);
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            });
        }
        let mut series = read_price_csv(ticker, &path)?;
        if self.clip_to_period {
            if let Some(last) = series.last().map(|b| b.date) {
                let start = period.start_date(last);
                let bars = series.bars().iter().filter(|b| b.date >= start).cloned().collect();
                series = PriceSeries::new(ticker, bars);
            }
        }
        Ok(series)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.replace(',', "").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// CSV reader settings shared by both sources. Short rows are accepted and
/// their missing cells read as absent.
fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.flexible(true).trim(csv::Trim::Headers);
    builder
}

/// Read one price CSV into a normalised series.
pub fn read_price_csv(ticker: &str, path: &Path) -> Result<PriceSeries, DataError> {
    let mut reader = reader_builder()
        .from_path(path)
        .map_err(|e| DataError::CsvError(format!("open {}: {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| DataError::CsvError(format!("read header of {}: {e}", path.display())))?
        .clone();
    let index: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
        .collect();
    for col in PRICE_COLUMNS {
        if !index.contains_key(col) {
            return Err(DataError::CsvError(format!(
                "{} is missing column '{col}'",
                path.display()
            )));
        }
    }
    let col = |name: &str| index[name];

    let mut bars = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| DataError::CsvError(format!("row {}: {e}", row + 1)))?;
        let Some(date) = record.get(col("date")).and_then(parse_date) else {
            debug!(ticker, row = row + 1, "skipping row with unparseable date");
            continue;
        };
        let field = |name: &str| parse_number(record.get(col(name))).unwrap_or(f64::NAN);
        bars.push(Bar {
            date,
            open: field("open"),
            high: field("high"),
            low: field("low"),
            close: field("close"),
            volume: parse_number(record.get(col("volume"))).map_or(0, |v| v.max(0.0) as u64),
        });
    }

    Ok(PriceSeries::new(ticker, bars))
}

/// Write a series in the layout `read_price_csv` accepts.
pub fn write_price_csv(series: &PriceSeries, path: &Path) -> Result<(), DataError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| DataError::CsvError(format!("create {}: {e}", path.display())))?;
    let to_err = |e: csv::Error| DataError::CsvError(format!("write {}: {e}", path.display()));
    writer
        .write_record(["Date", "Open", "High", "Low", "Close", "Volume"])
        .map_err(to_err)?;
    for bar in series.bars() {
        writer
            .write_record([
                bar.date.format("%Y-%m-%d").to_string(),
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                bar.volume.to_string(),
            ])
            .map_err(to_err)?;
    }
    writer
        .flush()
        .map_err(|e| DataError::CsvError(format!("flush {}: {e}", path.display())))
}

impl PriceSource for CsvPriceSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn source(&self) -> DataSource {
        DataSource::Csv
    }

    fn fetch_with_progress(&self, tickers: &[Ticker], period: Period, progress: &dyn FetchProgress) -> PriceBatch {
        let total = tickers.len();
        let mut batch = PriceBatch::new();
        for (i, ticker) in tickers.iter().enumerate() {
            progress.on_start(ticker, i, total);
            let outcome = self.load(ticker, period);
            report_outcome(progress, ticker, i, total, &outcome);
            batch.record(ticker, outcome);
        }
        progress.on_batch_complete(batch.series.len(), batch.failures.len(), total);
        batch
    }
}

/// Fundamentals loaded once from a CSV file.
#[derive(Debug, Clone, Default)]
pub struct CsvFundamentals {
    snapshots: TickerMap<FundamentalSnapshot>,
}

impl CsvFundamentals {
    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        let reader = reader_builder()
            .from_path(path)
            .map_err(|e| DataError::CsvError(format!("open {}: {e}", path.display())))?;
        Self::from_csv(reader)
    }

    /// Rows may be ragged: missing trailing cells read as absent metrics.
    pub fn from_reader<R: std::io::Read>(rdr: R) -> Result<Self, DataError> {
        Self::from_csv(reader_builder().from_reader(rdr))
    }

    fn from_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self, DataError> {
        let headers = reader
            .headers()
            .map_err(|e| DataError::CsvError(format!("read header: {e}")))?
            .clone();

        let mut ticker_col = None;
        let mut metric_cols = Vec::new();
        for (i, header) in headers.iter().enumerate() {
            let name = header.trim().to_ascii_lowercase();
            if name == "ticker" || name == "symbol" {
                ticker_col = Some(i);
            } else if let Ok(metric) = name.parse::<FundamentalMetric>() {
                metric_cols.push((i, metric));
            } else {
                debug!(column = %header, "ignoring unknown fundamentals column");
            }
        }
        let ticker_col =
            ticker_col.ok_or_else(|| DataError::CsvError("fundamentals CSV needs a 'ticker' column".into()))?;

        let mut snapshots = TickerMap::new();
        for (row, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(row = row + 1, error = %e, "skipping unreadable fundamentals row");
                    continue;
                }
            };
            let Some(ticker) = record.get(ticker_col).map(str::trim).filter(|t| !t.is_empty()) else {
                continue;
            };
            let mut snapshot = FundamentalSnapshot::empty();
            for &(i, metric) in &metric_cols {
                snapshot.set(metric, parse_number(record.get(i)));
            }
            snapshots.insert(ticker.to_string(), snapshot);
        }
        Ok(Self { snapshots })
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl FundamentalsSource for CsvFundamentals {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, tickers: &[Ticker]) -> TickerMap<FundamentalSnapshot> {
        tickers
            .iter()
            .map(|ticker| {
                let snapshot = self.snapshots.get(ticker).cloned().unwrap_or_else(|| {
                    warn!(ticker = %ticker, "no fundamentals row, using empty snapshot");
                    FundamentalSnapshot::empty()
                });
                (ticker.clone(), snapshot)
            })
            .collect()
    }
}
