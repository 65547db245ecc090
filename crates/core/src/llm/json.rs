use crate::domain::contract::LlmRecommendation;
use crate::domain::recommendation::Recommendation;
use anyhow::Context;

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if let Some(fenced) = trimmed.strip_prefix("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```), single-line or not.
        let mut inner = fenced.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

pub fn parse_recommendation(text: &str) -> anyhow::Result<Recommendation> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmRecommendation>(&json_str).with_context(|| {
        format!("LLM output is not valid JSON for the recommendation schema: {json_str}")
    })?;
    parsed.validate_and_into_recommendation()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::Direction;

    const VALID: &str = r#"{
        "direction": "hold",
        "target_price_low": 205.0,
        "target_price_high": 240.0,
        "rationale": ["services growth offsets hardware", "buybacks support EPS"],
        "risks": ["regulatory pressure on app store"],
        "confidence": 0.55
    }"#;

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_handles_single_line_fences() {
        assert_eq!(extract_json("```{\"a\":1}```"), Some("{\"a\":1}".to_string()));
        assert_eq!(extract_json("```json {\"a\":1} ```"), Some("{\"a\":1}".to_string()));

        let one_line = format!("```json{}```", VALID.replace('\n', " "));
        assert_eq!(parse_recommendation(&one_line).unwrap().direction, Direction::Hold);
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "Here is my call: {\"a\":1} hope it helps";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn parses_prose_wrapped_recommendation() {
        let text = format!("After weighing the analyses:\n```json\n{VALID}\n```");
        let rec = parse_recommendation(&text).unwrap();
        assert_eq!(rec.direction, Direction::Hold);
        assert_eq!(rec.rationale.len(), 2);
        assert_eq!(rec.risks.len(), 1);
    }

    #[test]
    fn rejects_missing_confidence() {
        let text = r#"{"direction": "buy", "rationale": ["x"]}"#;
        assert!(parse_recommendation(text).is_err());
    }

    #[test]
    fn accepts_missing_target_range() {
        let text = r#"{"direction": "sell", "rationale": ["x"], "confidence": 0.3}"#;
        let rec = parse_recommendation(text).unwrap();
        assert!(rec.target.is_none());
        assert!(rec.risks.is_empty());
    }
}
