//! Data layer: price and fundamentals sources, the Parquet cache, universes.

pub mod alphavantage;
pub mod cache;
pub mod circuit_breaker;
pub mod csv_source;
pub mod provider;
pub mod synthetic;
pub mod universe;
pub mod yahoo;

pub use alphavantage::AlphaVantageProvider;
pub use cache::{CacheMeta, CacheStatus, CachedPriceSource, CoverageResult, ParquetCache};
pub use circuit_breaker::CircuitBreaker;
pub use csv_source::{read_price_csv, write_price_csv, CsvFundamentals, CsvPriceSource};
pub use provider::{
    DataError, DataSource, FetchProgress, FundamentalsSource, NoFundamentals, PriceBatch,
    PriceSource, SilentProgress, StdoutProgress,
};
pub use synthetic::SyntheticPriceSource;
pub use universe::{dedup_tickers, Universe, UniverseError};
pub use yahoo::{YahooClient, YahooFundamentals, YahooProvider};

use crate::config::{ProviderConfig, ProviderKind, ScreenConfig};
use crate::domain::{FundamentalSnapshot, Period, Ticker, TickerMap};
use std::sync::Arc;

impl<T: PriceSource + ?Sized> PriceSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn source(&self) -> DataSource {
        (**self).source()
    }

    fn fetch_with_progress(&self, tickers: &[Ticker], period: Period, progress: &dyn FetchProgress) -> PriceBatch {
        (**self).fetch_with_progress(tickers, period, progress)
    }
}

impl<T: FundamentalsSource + ?Sized> FundamentalsSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, tickers: &[Ticker]) -> TickerMap<FundamentalSnapshot> {
        (**self).fetch(tickers)
    }
}

fn yahoo_client() -> Result<Arc<YahooClient>, DataError> {
    Ok(Arc::new(YahooClient::new(Arc::new(CircuitBreaker::default_provider()))?))
}

/// Construct the price source named by `config.kind`.
pub fn build_price_source(config: &ProviderConfig) -> Result<Box<dyn PriceSource>, DataError> {
    let source: Box<dyn PriceSource> = match config.kind {
        ProviderKind::Yahoo => Box::new(YahooProvider::new(yahoo_client()?).with_max_parallel(config.max_parallel)),
        ProviderKind::AlphaVantage => Box::new(AlphaVantageProvider::new(config.api_key.clone())?),
        ProviderKind::Csv => {
            let dir = config
                .dir
                .clone()
                .ok_or_else(|| DataError::Other("csv provider needs a directory".into()))?;
            Box::new(CsvPriceSource::new(dir))
        }
        ProviderKind::Synthetic => Box::new(SyntheticPriceSource::new(config.seed)),
    };
    Ok(source)
}

/// Construct the fundamentals source for `config`.
///
/// A fundamentals CSV wins; otherwise the online providers use Yahoo
/// quoteSummary and the offline ones know nothing.
pub fn build_fundamentals_source(config: &ProviderConfig) -> Result<Box<dyn FundamentalsSource>, DataError> {
    if !config.fundamentals {
        return Ok(Box::new(NoFundamentals));
    }
    if let Some(path) = &config.fundamentals_csv {
        return Ok(Box::new(CsvFundamentals::from_path(path)?));
    }
    let source: Box<dyn FundamentalsSource> = match config.kind {
        ProviderKind::Yahoo | ProviderKind::AlphaVantage => Box::new(YahooFundamentals::new(yahoo_client()?)),
        ProviderKind::Csv | ProviderKind::Synthetic => Box::new(NoFundamentals),
    };
    Ok(source)
}

/// Both sources for a screen, with the price cache applied if configured.
pub struct Sources {
    pub prices: Box<dyn PriceSource>,
    pub fundamentals: Box<dyn FundamentalsSource>,
}

impl Sources {
    pub fn from_config(config: &ScreenConfig) -> Result<Self, DataError> {
        let mut prices = build_price_source(&config.provider)?;
        if let Some(cache) = &config.cache {
            prices = Box::new(CachedPriceSource::new(prices, ParquetCache::new(&cache.dir)));
        }
        Ok(Self {
            prices,
            fundamentals: build_fundamentals_source(&config.provider)?,
        })
    }
}
