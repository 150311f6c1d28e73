//! FactorLab Core — multi-factor equity scoring.
//!
//! This crate contains:
//! - Domain types (bars, price series, fundamental snapshots, markets, periods)
//! - Price indicators (SMA, EMA, RSI, MACD) behind one `Indicator` trait
//! - Factor scoring: momentum, technical, fundamental, weighted composite, ranker
//! - Data sources (Yahoo, Alpha Vantage, CSV, synthetic) and a Parquet cache
//! - The screen pipeline and its exportable report
//!
//! The scoring functions are pure and allocate fresh outputs per call, so
//! they can be invoked from any number of threads at once.

pub mod config;
pub mod data;
pub mod domain;
pub mod fingerprint;
pub mod indicators;
pub mod pipeline;
pub mod report;
pub mod scoring;

pub use config::{ConfigError, ProviderConfig, ProviderKind, ScreenConfig};
pub use pipeline::{score_batch, screen, screen_with_progress, ScreenError};
pub use report::{ScreenReport, TickerReport};
