use finsynth_core::analysis::{AnalysisResult, TaskOutcome};
use finsynth_core::orchestrator::{OrchestrationReport, SynthesisFailure};
use std::fmt::Write;

pub fn report_text(report: &OrchestrationReport) -> String {
    let rec = &report.recommendation;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} ({}, {} to {}) run {}",
        report.ticker,
        report.period,
        bound(report.range.start),
        bound(report.range.end),
        report.run_id
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Recommendation: {} (confidence {:.2})",
        rec.direction.to_string().to_uppercase(),
        rec.confidence
    );
    if let Some(target) = &rec.target {
        let _ = writeln!(out, "Target: {:.2} - {:.2}", target.low, target.high);
    }
    let _ = writeln!(out, "Rationale:");
    for line in &rec.rationale {
        let _ = writeln!(out, "  - {line}");
    }
    if !rec.risks.is_empty() {
        let _ = writeln!(out, "Risks:");
        for line in &rec.risks {
            let _ = writeln!(out, "  - {line}");
        }
    }

    let _ = writeln!(out);
    tasks_text(&mut out, &report.tasks);
    let _ = writeln!(
        out,
        "Tokens: {} in / {} out",
        report.usage.input_tokens, report.usage.output_tokens
    );
    out
}

pub fn failure_text(failure: &SynthesisFailure) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} run {}: synthesis failed: {}",
        failure.ticker, failure.run_id, failure.cause
    );
    let _ = writeln!(out);
    tasks_text(&mut out, &failure.tasks);
    out
}

fn tasks_text(out: &mut String, tasks: &[TaskOutcome]) {
    for task in tasks {
        match &task.result {
            AnalysisResult::Narrative { text } => {
                let _ = writeln!(
                    out,
                    "[{}] {} records, {} dropped",
                    task.domain, task.records_used, task.records_dropped
                );
                let _ = writeln!(out, "{text}");
            }
            AnalysisResult::Absent { reason } => {
                let _ = writeln!(out, "[{}] unavailable: {reason}", task.domain);
            }
        }
        let _ = writeln!(out);
    }
}

fn bound(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "open".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsynth_core::analysis::AnalysisDomain;
    use finsynth_core::domain::recommendation::{Direction, Recommendation, TargetRange};
    use finsynth_core::domain::request::{DateRange, Period, Ticker};
    use finsynth_core::llm::Usage;

    fn outcome(domain: AnalysisDomain, result: AnalysisResult) -> TaskOutcome {
        TaskOutcome {
            domain,
            result,
            records_used: 3,
            records_dropped: 1,
            usage: Usage::default(),
        }
    }

    #[test]
    fn text_report_lists_recommendation_and_every_domain() {
        let report = OrchestrationReport {
            run_id: Default::default(),
            ticker: Ticker::parse("AAPL").unwrap(),
            period: Period::Quarterly,
            range: DateRange::parse(Some("2024-01-01"), None).unwrap(),
            tasks: vec![
                outcome(
                    AnalysisDomain::Metrics,
                    AnalysisResult::Narrative {
                        text: "Margins expanded.".to_string(),
                    },
                ),
                outcome(
                    AnalysisDomain::News,
                    AnalysisResult::Absent {
                        reason: "no data found".to_string(),
                    },
                ),
            ],
            recommendation: Recommendation {
                direction: Direction::Hold,
                target: Some(TargetRange {
                    low: 205.0,
                    high: 240.0,
                }),
                rationale: vec!["services growth".to_string()],
                risks: vec![],
                confidence: 0.55,
            },
            synthesis_text: "{}".to_string(),
            usage: Usage {
                input_tokens: 1200,
                output_tokens: 300,
            },
        };

        let text = report_text(&report);
        assert!(text.starts_with("AAPL (quarterly, 2024-01-01 to open)"));
        assert!(text.contains("Recommendation: HOLD (confidence 0.55)"));
        assert!(text.contains("Target: 205.00 - 240.00"));
        assert!(text.contains("[metrics] 3 records, 1 dropped\nMargins expanded."));
        assert!(text.contains("[news] unavailable: no data found"));
        assert!(!text.contains("Risks:"));
    }
}
