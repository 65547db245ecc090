use crate::domain::records::ValidatedRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider data categories, one per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Metrics,
    Statements,
    News,
    Prices,
}

impl Domain {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Domain::Metrics => "financial-metrics",
            Domain::Statements => "financials",
            Domain::News => "news",
            Domain::Prices => "prices",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Metrics => "metrics",
            Domain::Statements => "statements",
            Domain::News => "news",
            Domain::Prices => "prices",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider record before validation.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Records that passed validation plus the number that did not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedBatch {
    pub domain: Domain,
    pub records: Vec<ValidatedRecord>,
    pub dropped: usize,
}

impl ValidatedBatch {
    pub fn valid_count(&self) -> usize {
        self.records.len()
    }

    pub fn raw_count(&self) -> usize {
        self.records.len() + self.dropped
    }
}
