//! End-to-end screen: fetch, score every factor, combine, rank.

use crate::config::{ConfigError, ScreenConfig};
use crate::data::{FetchProgress, FundamentalsSource, PriceBatch, PriceSource, SilentProgress};
use crate::domain::{FundamentalSnapshot, Ticker, TickerMap};
use crate::fingerprint::DatasetHash;
use crate::report::{ScreenReport, TickerReport};
use crate::scoring::{
    composite, cross_section_stats, fundamental, momentum_detailed, rank_composite,
    technical_composites, technical_detailed,
};
use thiserror::Error;
use tracing::info;

/// Batch-level failures. Per-ticker problems never surface here.
#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("empty universe: no tickers to screen")]
    EmptyUniverse,

    #[error("no data: none of the {requested} requested tickers returned prices or fundamentals")]
    NoData { requested: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Fetch data for the configured universe and score it.
pub fn screen(
    prices: &dyn PriceSource,
    fundamentals: &dyn FundamentalsSource,
    config: &ScreenConfig,
) -> Result<ScreenReport, ScreenError> {
    screen_with_progress(prices, fundamentals, config, &SilentProgress)
}

pub fn screen_with_progress(
    prices: &dyn PriceSource,
    fundamentals: &dyn FundamentalsSource,
    config: &ScreenConfig,
    progress: &dyn FetchProgress,
) -> Result<ScreenReport, ScreenError> {
    config.validate()?;
    let tickers = config.tickers()?;
    if tickers.is_empty() {
        return Err(ScreenError::EmptyUniverse);
    }

    info!(tickers = tickers.len(), source = prices.name(), period = %config.screen.period, "fetching prices");
    let batch = prices.fetch_with_progress(&tickers, config.screen.period, progress);
    if batch.is_empty() {
        return Err(ScreenError::NoData {
            requested: tickers.len(),
        });
    }

    // Only tickers with prices are worth a fundamentals lookup.
    let priced: Vec<Ticker> = batch.series.keys().cloned().collect();
    info!(tickers = priced.len(), source = fundamentals.name(), "fetching fundamentals");
    let snapshots = fundamentals.fetch(&priced);

    score_batch(&tickers, batch, snapshots, config)
}

/// Score already-fetched data. Pure: no I/O.
pub fn score_batch(
    requested: &[Ticker],
    batch: PriceBatch,
    snapshots: TickerMap<FundamentalSnapshot>,
    config: &ScreenConfig,
) -> Result<ScreenReport, ScreenError> {
    if batch.series.is_empty() && snapshots.values().all(FundamentalSnapshot::is_empty) {
        return Err(ScreenError::NoData {
            requested: requested.len(),
        });
    }

    let series = &batch.series;
    let weights = config.weights.effective();

    let momentum = momentum_detailed(series, config.screen.momentum_window);
    let technical = technical_detailed(series);
    let fundamentals = fundamental(&snapshots);
    let fundamental_scores: TickerMap<f64> = fundamentals
        .iter()
        .map(|(t, b)| (t.clone(), b.composite))
        .collect();

    let combined = composite(
        &momentum.scores,
        &technical_composites(&technical.scores),
        &fundamental_scores,
        &weights,
    );
    let ranked = rank_composite(&combined, config.screen.top_n);

    let tickers = combined
        .iter()
        .map(|(ticker, score)| {
            let detail = TickerReport {
                momentum: momentum.scores.get(ticker).copied(),
                technical: technical.scores.get(ticker).copied(),
                fundamental: fundamentals.get(ticker).cloned(),
                score: *score,
            };
            (ticker.clone(), detail)
        })
        .collect();

    info!(
        requested = requested.len(),
        priced = series.len(),
        scored = combined.len(),
        momentum_omitted = momentum.omitted.len(),
        ranked = ranked.len(),
        "screen complete"
    );

    Ok(ScreenReport {
        generated_at: chrono::Local::now().naive_local(),
        config_hash: config.fingerprint(requested),
        dataset_hash: DatasetHash::of_series(series),
        market: config.screen.market,
        period: config.screen.period,
        momentum_window: config.screen.momentum_window,
        top_n: config.screen.top_n,
        weights,
        requested: requested.to_vec(),
        price_failures: batch
            .failures
            .iter()
            .map(|(t, e)| (t.clone(), e.to_string()))
            .collect(),
        momentum_omitted: momentum.omitted,
        technical_omitted: technical.omitted,
        tickers,
        cross_section: cross_section_stats(&snapshots),
        ranked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataError, NoFundamentals};
    use crate::scoring::{make_series, Omission};

    fn config(top_n: usize, window: usize) -> ScreenConfig {
        let mut c = ScreenConfig::default();
        c.screen.top_n = top_n;
        c.screen.momentum_window = window;
        c
    }

    fn rising(n: usize, step: f64) -> Vec<f64> {
        (0..n).map(|i| 100.0 + step * i as f64).collect()
    }

    #[test]
    fn scores_and_ranks_batch() {
        let mut batch = PriceBatch::new();
        batch.record("UP", Ok(make_series("UP", &rising(60, 1.0))));
        batch.record("DOWN", Ok(make_series("DOWN", &rising(60, -0.5))));
        batch.record("SHORT", Ok(make_series("SHORT", &rising(5, 1.0))));
        batch.record("GONE", Err(DataError::SymbolNotFound { symbol: "GONE".into() }));

        let requested: Vec<Ticker> = ["UP", "DOWN", "SHORT", "GONE"].map(String::from).to_vec();
        let snapshots = NoFundamentals.fetch(&batch.series.keys().cloned().collect::<Vec<_>>());
        let report = score_batch(&requested, batch, snapshots, &config(2, 30)).unwrap();

        assert_eq!(report.ranked.len(), 2);
        assert_eq!(report.ranked[0].ticker, "UP");
        assert!(report.price_failures.contains_key("GONE"));
        assert!(matches!(
            report.momentum_omitted.get("SHORT"),
            Some(Omission::InsufficientHistory { bars: 5, required: 31 })
        ));
        // Still scored through technical and fundamental factors.
        assert!(report.tickers.contains_key("SHORT"));
        assert_eq!(report.tickers["SHORT"].momentum, None);
    }

    #[test]
    fn no_data_is_an_error() {
        let requested = vec!["A".to_string()];
        let err = score_batch(&requested, PriceBatch::new(), TickerMap::new(), &config(5, 30)).unwrap_err();
        assert!(matches!(err, ScreenError::NoData { requested: 1 }));
    }

    #[test]
    fn fundamentals_alone_still_rank() {
        let mut snaps = TickerMap::new();
        snaps.insert(
            "F".to_string(),
            FundamentalSnapshot {
                pe_ratio: Some(17.5),
                ..Default::default()
            },
        );
        let report = score_batch(&["F".to_string()], PriceBatch::new(), snaps, &config(5, 30)).unwrap();
        assert_eq!(report.ranked.len(), 1);
    }
}
