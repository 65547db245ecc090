use crate::domain::recommendation::{Direction, Recommendation, TargetRange};
use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};

/// Recommendation as the model emits it, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRecommendation {
    pub direction: String,
    #[serde(default)]
    pub target_price_low: Option<f64>,
    #[serde(default)]
    pub target_price_high: Option<f64>,
    pub rationale: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    pub confidence: f64,
}

impl LlmRecommendation {
    pub fn validate_and_into_recommendation(self) -> anyhow::Result<Recommendation> {
        let direction = match self.direction.trim().to_ascii_lowercase().as_str() {
            "buy" => Direction::Buy,
            "hold" => Direction::Hold,
            "sell" => Direction::Sell,
            other => bail!("direction must be buy, hold or sell (got {other:?})"),
        };

        let target = match (self.target_price_low, self.target_price_high) {
            (Some(low), Some(high)) => {
                ensure!(
                    low.is_finite() && high.is_finite() && low > 0.0,
                    "target prices must be positive numbers (got {low}..{high})"
                );
                ensure!(low <= high, "target range is inverted: {low} > {high}");
                Some(TargetRange { low, high })
            }
            (None, None) => None,
            _ => bail!("target_price_low and target_price_high must be given together"),
        };

        let rationale = trimmed_lines(self.rationale);
        ensure!(!rationale.is_empty(), "rationale must have at least one line");

        ensure!(
            (0.0..=1.0).contains(&self.confidence),
            "confidence must be between 0 and 1 (got {})",
            self.confidence
        );

        Ok(Recommendation {
            direction,
            target,
            rationale,
            risks: trimmed_lines(self.risks),
            confidence: self.confidence,
        })
    }
}

fn trimmed_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> LlmRecommendation {
        LlmRecommendation {
            direction: "Buy".into(),
            target_price_low: Some(210.0),
            target_price_high: Some(245.0),
            rationale: vec![" margins expanding ".into(), "".into()],
            risks: vec!["china demand".into()],
            confidence: 0.6,
        }
    }

    #[test]
    fn accepts_and_normalizes() {
        let rec = base().validate_and_into_recommendation().unwrap();
        assert_eq!(rec.direction, Direction::Buy);
        assert_eq!(rec.rationale, vec!["margins expanding".to_string()]);
        assert_eq!(rec.target.unwrap().high, 245.0);
    }

    #[test]
    fn rejects_inverted_target_and_bad_confidence() {
        let mut r = base();
        r.target_price_low = Some(300.0);
        assert!(r.validate_and_into_recommendation().is_err());

        let mut r = base();
        r.confidence = 1.5;
        assert!(r.validate_and_into_recommendation().is_err());

        let mut r = base();
        r.target_price_high = None;
        assert!(r.validate_and_into_recommendation().is_err());
    }

    #[test]
    fn rejects_unknown_direction() {
        let mut r = base();
        r.direction = "accumulate".into();
        assert!(r.validate_and_into_recommendation().is_err());
    }
}
