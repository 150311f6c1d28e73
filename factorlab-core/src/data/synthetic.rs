//! Deterministic synthetic prices for offline runs, demos and tests.
//!
//! Each ticker gets its own geometric random walk over weekdays. The walk is
//! seeded from BLAKE3(master seed, ticker), so a ticker's series does not
//! depend on which other tickers are requested or in what order.

use super::provider::{report_outcome, DataError, DataSource, FetchProgress, PriceBatch, PriceSource};
use crate::domain::{Bar, Period, PriceSeries, Ticker};
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct SyntheticPriceSource {
    seed: u64,
    end: Option<NaiveDate>,
}

impl SyntheticPriceSource {
    pub fn new(seed: u64) -> Self {
        Self { seed, end: None }
    }

    /// Pin the last generated date (defaults to today).
    pub fn ending_on(mut self, end: NaiveDate) -> Self {
        self.end = Some(end);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Per-ticker seed, independent of request order.
    pub fn ticker_seed(&self, ticker: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(ticker.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Generate the series for one ticker between `start` and `end` inclusive.
    pub fn generate(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        let mut rng = StdRng::seed_from_u64(self.ticker_seed(ticker));
        let drift: f64 = rng.gen_range(-0.0010..0.0015);
        let vol: f64 = rng.gen_range(0.008..0.025);
        let mut close: f64 = rng.gen_range(20.0..200.0);

        let mut bars = Vec::new();
        let mut date = start;
        while date <= end {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                let open = close;
                let shock: f64 = rng.gen_range(-1.0..1.0) * vol * 1.7;
                close = (open * (1.0 + drift + shock)).max(0.01);
                let wick: f64 = rng.gen_range(0.0..vol);
                bars.push(Bar {
                    date,
                    open,
                    high: open.max(close) * (1.0 + wick),
                    low: open.min(close) * (1.0 - wick),
                    close,
                    volume: rng.gen_range(100_000..2_000_000),
                });
            }
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        PriceSeries::new(ticker, bars)
    }
}

impl PriceSource for SyntheticPriceSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn source(&self) -> DataSource {
        DataSource::Synthetic
    }

    fn fetch_with_progress(&self, tickers: &[Ticker], period: Period, progress: &dyn FetchProgress) -> PriceBatch {
        let end = self.end.unwrap_or_else(|| chrono::Local::now().date_naive());
        // "max" would be 50+ years of noise; cap it at ten.
        let start = match period {
            Period::Max => Period::TenYears.start_date(end),
            other => other.start_date(end),
        };
        let total = tickers.len();
        let mut batch = PriceBatch::new();
        for (i, ticker) in tickers.iter().enumerate() {
            progress.on_start(ticker, i, total);
            let outcome: Result<PriceSeries, DataError> = Ok(self.generate(ticker, start, end));
            report_outcome(progress, ticker, i, total, &outcome);
            batch.record(ticker, outcome);
        }
        progress.on_batch_complete(batch.series.len(), batch.failures.len(), total);
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
    }

    #[test]
    fn deterministic_and_order_independent() {
        let source = SyntheticPriceSource::new(42).ending_on(end());
        let a = source.fetch(&["AAA".into(), "BBB".into()], Period::SixMonths);
        let b = source.fetch(&["BBB".into(), "AAA".into()], Period::SixMonths);
        assert_eq!(a.series["AAA"], b.series["AAA"]);
        assert_eq!(a.series["BBB"], b.series["BBB"]);
        assert_ne!(a.series["AAA"].closes(), a.series["BBB"].closes());
    }

    #[test]
    fn weekdays_only_and_sane() {
        let source = SyntheticPriceSource::new(7);
        let series = source.generate("X", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), end());
        assert!(series.len() > 100);
        assert!(series
            .bars()
            .iter()
            .all(|b| !matches!(b.date.weekday(), Weekday::Sat | Weekday::Sun)));
        assert!(series.bars().iter().all(|b| b.is_sane() && b.has_usable_close()));
    }

    #[test]
    fn seed_changes_output() {
        let a = SyntheticPriceSource::new(1).ticker_seed("X");
        let b = SyntheticPriceSource::new(2).ticker_seed("X");
        assert_ne!(a, b);
    }
}
