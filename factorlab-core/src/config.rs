//! Screen configuration, loaded from TOML.
//!
//! ```toml
//! [screen]
//! market = "UK"
//! tickers = []            # empty: the market's default list
//! period = "1y"
//! momentum_window = 30
//! top_n = 5
//!
//! [weights]
//! momentum = 0.4
//! technical = 0.35
//! fundamental = 0.25
//! normalize = false
//!
//! [provider]
//! kind = "yahoo"          # yahoo | alpha_vantage | csv | synthetic
//!
//! [cache]
//! dir = ".factorlab/cache"
//! ```
//!
//! Every value is carried explicitly into the pipeline; nothing here is read
//! from global state except the Alpha Vantage key fallback.

use crate::data::universe::{dedup_tickers, Universe, UniverseError};
use crate::domain::{Market, Period, Ticker};
use crate::fingerprint::ConfigHash;
use crate::scoring::Weights;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_MOMENTUM_WINDOW: usize = 30;
pub const DEFAULT_TOP_N: usize = 5;
pub const DEFAULT_SEED: u64 = 42;

/// Weight sums further than this from 1 are rescaled when `normalize` is set.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Universe(#[from] UniverseError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub screen: ScreenSection,
    pub weights: WeightsConfig,
    pub provider: ProviderConfig,
    pub cache: Option<CacheConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenSection {
    pub market: Market,
    /// Explicit tickers; overrides `universe_file` and the market list.
    pub tickers: Vec<Ticker>,
    /// TOML universe of ticker groups; overrides the market list.
    pub universe_file: Option<PathBuf>,
    pub period: Period,
    pub momentum_window: usize,
    pub top_n: usize,
}

impl Default for ScreenSection {
    fn default() -> Self {
        Self {
            market: Market::default(),
            tickers: Vec::new(),
            universe_file: None,
            period: Period::default(),
            momentum_window: DEFAULT_MOMENTUM_WINDOW,
            top_n: DEFAULT_TOP_N,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    pub momentum: f64,
    pub technical: f64,
    pub fundamental: f64,
    /// Rescale to sum 1 when the sum is off by more than [`WEIGHT_SUM_TOLERANCE`].
    pub normalize: bool,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        let w = Weights::default();
        Self {
            momentum: w.momentum,
            technical: w.technical,
            fundamental: w.fundamental,
            normalize: false,
        }
    }
}

impl WeightsConfig {
    pub fn raw(&self) -> Weights {
        Weights::new(self.momentum, self.technical, self.fundamental)
    }

    /// Weights actually handed to the combiner.
    pub fn effective(&self) -> Weights {
        let raw = self.raw();
        if self.normalize && (raw.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            raw.normalized().unwrap_or(raw)
        } else {
            raw
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Yahoo,
    AlphaVantage,
    Csv,
    Synthetic,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Yahoo,
        ProviderKind::AlphaVantage,
        ProviderKind::Csv,
        ProviderKind::Synthetic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Yahoo => "yahoo",
            ProviderKind::AlphaVantage => "alpha_vantage",
            ProviderKind::Csv => "csv",
            ProviderKind::Synthetic => "synthetic",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        ProviderKind::ALL
            .into_iter()
            .find(|k| k.as_str() == needle)
            .ok_or_else(|| format!("unknown provider '{s}' (expected yahoo, alpha_vantage, csv or synthetic)"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Directory of `<TICKER>.csv` files (csv provider).
    pub dir: Option<PathBuf>,
    /// Master seed (synthetic provider).
    pub seed: u64,
    /// Alpha Vantage key; falls back to `ALPHA_VANTAGE_API_KEY`.
    pub api_key: Option<String>,
    /// Concurrent requests for the Yahoo provider.
    pub max_parallel: usize,
    /// Fetch fundamentals at all. When false every ticker scores neutral.
    pub fundamentals: bool,
    /// Read fundamentals from this CSV instead of the provider.
    pub fundamentals_csv: Option<PathBuf>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            dir: None,
            seed: DEFAULT_SEED,
            api_key: None,
            max_parallel: 4,
            fundamentals: true,
            fundamentals_csv: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub dir: PathBuf,
}

/// Scoring-relevant subset of the config, hashed by [`ScreenConfig::fingerprint`].
#[derive(Serialize)]
struct FingerprintInput<'a> {
    tickers: &'a [Ticker],
    period: Period,
    momentum_window: usize,
    top_n: usize,
    weights: [f64; 3],
    provider: ProviderKind,
    seed: Option<u64>,
}

impl ScreenConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.weights;
        for (name, value) in [
            ("momentum", w.momentum),
            ("technical", w.technical),
            ("fundamental", w.fundamental),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "weights.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.screen.momentum_window == 0 {
            return Err(ConfigError::Invalid("screen.momentum_window must be at least 1".into()));
        }
        if self.provider.kind == ProviderKind::Csv && self.provider.dir.is_none() {
            return Err(ConfigError::Invalid("provider.dir is required for the csv provider".into()));
        }
        Ok(())
    }

    /// Tickers to screen: explicit list, else universe file, else market default.
    pub fn tickers(&self) -> Result<Vec<Ticker>, ConfigError> {
        if !self.screen.tickers.is_empty() {
            return Ok(dedup_tickers(&self.screen.tickers));
        }
        if let Some(path) = &self.screen.universe_file {
            return Ok(Universe::from_file(path)?.tickers());
        }
        Ok(Universe::for_market(self.screen.market).tickers())
    }

    /// BLAKE3 of the canonical JSON of the scoring-relevant settings.
    pub fn fingerprint(&self, tickers: &[Ticker]) -> ConfigHash {
        let weights = self.weights.effective();
        let input = FingerprintInput {
            tickers,
            period: self.screen.period,
            momentum_window: self.screen.momentum_window,
            top_n: self.screen.top_n,
            weights: [weights.momentum, weights.technical, weights.fundamental],
            provider: self.provider.kind,
            seed: (self.provider.kind == ProviderKind::Synthetic).then_some(self.provider.seed),
        };
        // Plain structs of numbers and strings always serialize.
        let json = serde_json::to_vec(&input).unwrap_or_default();
        ConfigHash::from_bytes(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    #[test]
    fn empty_toml_gives_defaults() {
        let c = ScreenConfig::from_toml("").unwrap();
        assert_eq!(c.screen.market, Market::Uk);
        assert_eq!(c.screen.period, Period::OneYear);
        assert_eq!(c.screen.momentum_window, 30);
        assert_eq!(c.screen.top_n, 5);
        assert_eq!(c.weights.raw(), Weights::default());
        assert_eq!(c.provider.kind, ProviderKind::Yahoo);
        assert!(c.cache.is_none());
    }

    #[test]
    fn full_toml() {
        let c = ScreenConfig::from_toml(
            r#"
            [screen]
            market = "MY"
            tickers = ["1155.KL", "1295.KL"]
            period = "6mo"
            momentum_window = 20
            top_n = 3

            [weights]
            momentum = 0.5
            technical = 0.5
            fundamental = 0.5
            normalize = true

            [provider]
            kind = "synthetic"
            seed = 9

            [cache]
            dir = "/tmp/fl"
            "#,
        )
        .unwrap();
        assert_eq!(c.screen.market, Market::My);
        assert_eq!(c.screen.period, Period::SixMonths);
        assert_eq!(c.tickers().unwrap(), ["1155.KL", "1295.KL"]);
        assert_eq!(c.provider.seed, 9);
        assert_eq!(c.cache.unwrap().dir, PathBuf::from("/tmp/fl"));
        let eff = c.weights.effective();
        assert_approx(eff.sum(), 1.0, 1e-12);
        assert_approx(eff.momentum, 1.0 / 3.0, 1e-12);
    }

    #[test]
    fn normalization_only_outside_tolerance() {
        let mut w = WeightsConfig {
            momentum: 0.4,
            technical: 0.35,
            fundamental: 0.255,
            normalize: true,
        };
        assert_eq!(w.effective(), w.raw());
        w.fundamental = 0.5;
        assert_ne!(w.effective(), w.raw());
        w.normalize = false;
        assert_eq!(w.effective(), w.raw());
    }

    #[test]
    fn validation_errors() {
        assert!(matches!(
            ScreenConfig::from_toml("[weights]\nmomentum = 1.5\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ScreenConfig::from_toml("[screen]\nmomentum_window = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ScreenConfig::from_toml("[provider]\nkind = \"csv\"\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ScreenConfig::from_toml("[screen]\nperiod = \"3w\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn default_tickers_come_from_market() {
        let c = ScreenConfig::default();
        assert_eq!(c.tickers().unwrap(), Market::Uk.tickers());
    }

    #[test]
    fn fingerprint_tracks_scoring_inputs() {
        let c = ScreenConfig::default();
        let tickers = c.tickers().unwrap();
        let base = c.fingerprint(&tickers);
        assert_eq!(base, c.fingerprint(&tickers));

        let mut other = c.clone();
        other.screen.momentum_window = 60;
        assert_ne!(base, other.fingerprint(&tickers));

        let mut keyed = c.clone();
        keyed.provider.api_key = Some("secret".into());
        assert_eq!(base, keyed.fingerprint(&tickers));
    }

    #[test]
    fn provider_kind_parsing() {
        assert_eq!("alpha-vantage".parse::<ProviderKind>().unwrap(), ProviderKind::AlphaVantage);
        assert_eq!("CSV".parse::<ProviderKind>().unwrap(), ProviderKind::Csv);
        assert!("bloomberg".parse::<ProviderKind>().is_err());
    }
}
