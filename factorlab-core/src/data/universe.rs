//! Universe: the list of tickers a screen runs over.
//!
//! A universe comes from a market's default list, an explicit ticker list, or
//! a TOML file of named groups:
//!
//! ```toml
//! [groups]
//! banks = ["BARC.L", "HSBA.L", "LLOY.L"]
//! miners = ["RIO.L", "GLEN.L", "AAL.L"]
//! ```
//!
//! Tickers are trimmed and upper-cased; duplicates are dropped keeping the
//! first occurrence.

use crate::domain::{Market, Ticker};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize universe: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
}

pub fn normalize_ticker(raw: &str) -> Option<Ticker> {
    let t = raw.trim().to_ascii_uppercase();
    (!t.is_empty()).then_some(t)
}

/// Normalise and de-duplicate, preserving first occurrence.
pub fn dedup_tickers<I, S>(tickers: I) -> Vec<Ticker>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    tickers
        .into_iter()
        .filter_map(|t| normalize_ticker(t.as_ref()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, UniverseError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// One group named after the market, holding its default list.
    pub fn for_market(market: Market) -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(market.info().index_name.to_string(), market.tickers());
        Self { groups }
    }

    pub fn from_tickers<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut groups = BTreeMap::new();
        groups.insert("custom".to_string(), dedup_tickers(tickers));
        Self { groups }
    }

    /// Every ticker across all groups, de-duplicated, in group order.
    pub fn tickers(&self) -> Vec<Ticker> {
        dedup_tickers(self.groups.values().flatten())
    }

    pub fn group(&self, name: &str) -> Option<&[String]> {
        self.groups.get(name).map(|v| v.as_slice())
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(|s| s.as_str()).collect()
    }

    pub fn ticker_count(&self) -> usize {
        self.tickers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(|g| g.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_preserves_first_occurrence() {
        let t = dedup_tickers([" barc.l", "HSBA.L", "BARC.L", "", "lloy.l", "hsba.l"]);
        assert_eq!(t, ["BARC.L", "HSBA.L", "LLOY.L"]);
    }

    #[test]
    fn market_universe() {
        let u = Universe::for_market(Market::Uk);
        assert_eq!(u.ticker_count(), Market::Uk.tickers().len());
        assert!(u.tickers().contains(&"AZN.L".to_string()));
    }

    #[test]
    fn toml_groups_overlap_is_deduped() {
        let u = Universe::from_toml(
            "[groups]\nbanks = [\"BARC.L\", \"HSBA.L\"]\nfavourites = [\"HSBA.L\", \"AZN.L\"]\n",
        )
        .unwrap();
        assert_eq!(u.group_names(), ["banks", "favourites"]);
        assert_eq!(u.tickers(), ["BARC.L", "HSBA.L", "AZN.L"]);
        let back = Universe::from_toml(&u.to_toml().unwrap()).unwrap();
        assert_eq!(back, u);
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(matches!(Universe::from_toml("groups = 3"), Err(UniverseError::Parse(_))));
    }
}
