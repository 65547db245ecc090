use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Hold,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Buy => "buy",
            Direction::Hold => "hold",
            Direction::Sell => "sell",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRange {
    pub low: f64,
    pub high: f64,
}

/// Final investment recommendation produced by the synthesis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub direction: Direction,
    pub target: Option<TargetRange>,
    pub rationale: Vec<String>,
    pub risks: Vec<String>,
    pub confidence: f64,
}
