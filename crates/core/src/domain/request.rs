use anyhow::{ensure, Context};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stock symbol. Opaque apart from trimming and upper-casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticker(String);

impl Ticker {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let t = s.trim();
        ensure!(!t.is_empty(), "ticker must be non-empty");
        ensure!(
            !t.chars().any(char::is_whitespace),
            "ticker must not contain whitespace (got {t:?})"
        );
        Ok(Self(t.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Annual,
    Quarterly,
    Monthly,
    Ttm,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Annual => "annual",
            Period::Quarterly => "quarterly",
            Period::Monthly => "monthly",
            Period::Ttm => "ttm",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annual" => Ok(Period::Annual),
            "quarterly" => Ok(Period::Quarterly),
            "monthly" => Ok(Period::Monthly),
            "ttm" => Ok(Period::Ttm),
            other => anyhow::bail!("unknown period {other:?} (expected annual|quarterly|monthly|ttm)"),
        }
    }
}

/// Inclusive date bounds. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> anyhow::Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            ensure!(s <= e, "start date {s} is after end date {e}");
        }
        Ok(Self { start, end })
    }

    /// Parses optional `YYYY-MM-DD` or `YYYYMMDD` bounds.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> anyhow::Result<Self> {
        let start = start.map(parse_input_date).transpose()?;
        let end = end.map(parse_input_date).transpose()?;
        Self::new(start, end)
    }
}

pub fn parse_input_date(s: &str) -> anyhow::Result<NaiveDate> {
    let t = s.trim();
    let fmt = if t.len() == 8 && t.bytes().all(|b| b.is_ascii_digit()) {
        "%Y%m%d"
    } else {
        "%Y-%m-%d"
    };
    NaiveDate::parse_from_str(t, fmt).with_context(|| format!("invalid date {t:?}"))
}

/// Parameters of one fetch. Built once per orchestration run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRequest {
    pub ticker: Ticker,
    pub period: Period,
    pub limit: u32,
    pub range: DateRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_is_normalized() {
        assert_eq!(Ticker::parse(" aapl ").unwrap().as_str(), "AAPL");
        assert!(Ticker::parse("   ").is_err());
        assert!(Ticker::parse("AA PL").is_err());
    }

    #[test]
    fn parses_compact_and_iso_dates() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(parse_input_date("20240101").unwrap(), d);
        assert_eq!(parse_input_date("2024-01-01").unwrap(), d);
        assert!(parse_input_date("01/01/2024").is_err());
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(DateRange::parse(Some("20250101"), Some("20240101")).is_err());
        let open = DateRange::parse(None, Some("2025-01-01")).unwrap();
        assert!(open.start.is_none());
    }

    #[test]
    fn period_round_trips_through_str() {
        assert_eq!("TTM".parse::<Period>().unwrap(), Period::Ttm);
        assert_eq!(Period::Quarterly.to_string(), "quarterly");
        assert!("weekly".parse::<Period>().is_err());
    }
}
