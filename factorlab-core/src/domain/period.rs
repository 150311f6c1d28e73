//! Lookback period for price history requests ("1mo", "6mo", "1y", ...).

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid period '{0}' (expected one of 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max)")]
pub struct PeriodParseError(pub String);

/// History window requested from a price source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Period {
    OneMonth,
    ThreeMonths,
    SixMonths,
    #[default]
    OneYear,
    TwoYears,
    FiveYears,
    TenYears,
    YearToDate,
    Max,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
            Period::TenYears => "10y",
            Period::YearToDate => "ytd",
            Period::Max => "max",
        }
    }

    /// First calendar date covered by this period when it ends on `end`.
    pub fn start_date(&self, end: NaiveDate) -> NaiveDate {
        let days = match self {
            Period::OneMonth => 31,
            Period::ThreeMonths => 92,
            Period::SixMonths => 183,
            Period::OneYear => 365,
            Period::TwoYears => 365 * 2,
            Period::FiveYears => 365 * 5 + 1,
            Period::TenYears => 365 * 10 + 2,
            Period::YearToDate => {
                return NaiveDate::from_ymd_opt(end.year(), 1, 1).unwrap_or(end);
            }
            Period::Max => {
                return NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(end);
            }
        };
        end - Duration::days(days)
    }

    /// Whether the period spans at least a year of history.
    pub fn is_long(&self) -> bool {
        matches!(
            self,
            Period::OneYear | Period::TwoYears | Period::FiveYears | Period::TenYears | Period::Max
        )
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = PeriodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1mo" => Ok(Period::OneMonth),
            "3mo" => Ok(Period::ThreeMonths),
            "6mo" => Ok(Period::SixMonths),
            "1y" => Ok(Period::OneYear),
            "2y" => Ok(Period::TwoYears),
            "5y" => Ok(Period::FiveYears),
            "10y" => Ok(Period::TenYears),
            "ytd" => Ok(Period::YearToDate),
            "max" => Ok(Period::Max),
            _ => Err(PeriodParseError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Period {
    type Error = PeriodParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(p: Period) -> Self {
        p.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        for s in ["1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max"] {
            assert_eq!(s.parse::<Period>().unwrap().as_str(), s);
        }
        assert!("7w".parse::<Period>().is_err());
    }

    #[test]
    fn one_year_start() {
        let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert_eq!(
            Period::OneYear.start_date(end),
            NaiveDate::from_ymd_opt(2023, 7, 1).unwrap()
        );
    }

    #[test]
    fn ytd_starts_jan_first() {
        let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert_eq!(
            Period::YearToDate.start_date(end),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }

    #[test]
    fn long_periods() {
        assert!(Period::OneYear.is_long());
        assert!(!Period::SixMonths.is_long());
    }
}
