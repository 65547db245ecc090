use crate::analysis::AnalysisDomain;
use crate::domain::request::AnalysisRequest;
use crate::ingest::types::ValidatedBatch;

const ROLE: &str =
    "You are an expert financial analyst with a Chartered Financial Analyst (CFA) designation.";

fn task_line(domain: AnalysisDomain) -> &'static str {
    match domain {
        AnalysisDomain::Metrics => "You are tasked with analyzing the financial metrics of a company.",
        AnalysisDomain::Statements => {
            "You are tasked with analyzing the income statements, balance sheets and cash flow statements of a company."
        }
        AnalysisDomain::News => {
            "You are tasked with analyzing the recent news of a company and its impact on the company's financial position."
        }
        AnalysisDomain::WebContext => {
            "You are tasked with placing the company in its market context using its recent daily price action."
        }
    }
}

fn records_heading(domain: AnalysisDomain) -> &'static str {
    match domain {
        AnalysisDomain::Metrics => "Financial metrics (one JSON object per line):",
        AnalysisDomain::Statements => "Financial statements (one JSON object per line):",
        AnalysisDomain::News => "Recent news (one JSON object per line):",
        AnalysisDomain::WebContext => "Daily price bars (one JSON object per line):",
    }
}

fn focus(domain: AnalysisDomain) -> &'static str {
    match domain {
        AnalysisDomain::Metrics => {
            "- Provide an analysis of the financial metrics, including trends, patterns and significant changes over the period."
        }
        AnalysisDomain::Statements => {
            "- Provide an analysis of revenue, profitability, balance sheet strength and cash generation across the statements."
        }
        AnalysisDomain::News => {
            "- Summarize the material news and explain its likely impact on the company's fundamentals and sentiment."
        }
        AnalysisDomain::WebContext => {
            "- Provide a high-level view of the stock, its industry and overall market conditions as reflected in the price action."
        }
    }
}

fn do_not(domain: AnalysisDomain) -> &'static str {
    match domain {
        AnalysisDomain::WebContext => {
            "- Dive deep into financial metrics or statements. Other analysts cover those."
        }
        _ => "- Speculate beyond the data provided.",
    }
}

/// System message for the web-context task. Other domains send only a user message.
pub fn system_prompt(domain: AnalysisDomain) -> Option<String> {
    match domain {
        AnalysisDomain::WebContext => Some(
            [
                "You are a Chartered Financial Analyst (CFA) and a professional trader.",
                "You are tasked with analyzing macroeconomic trends regarding a specific stock, the industry",
                "it operates in, and the overall market conditions.",
                "Focus on the current market position, potential risks and opportunities.",
            ]
            .join("\n"),
        ),
        _ => None,
    }
}

/// Deterministic task prompt: same request and batch always render the same text.
pub fn user_prompt(
    domain: AnalysisDomain,
    request: &AnalysisRequest,
    batch: &ValidatedBatch,
) -> String {
    let mut lines: Vec<String> = vec![ROLE.to_string(), task_line(domain).to_string()];

    lines.push(String::new());
    lines.push("Request:".to_string());
    lines.push(format!("- Ticker: {}", request.ticker));
    lines.push(format!("- Period: {}", request.period));
    lines.push(format!("- Limit: {}", request.limit));
    lines.push(format!("- Start date: {}", bound(request.range.start)));
    lines.push(format!("- End date: {}", bound(request.range.end)));

    lines.push(String::new());
    lines.push(records_heading(domain).to_string());
    lines.extend(batch.records.iter().map(|r| r.to_prompt_line()));

    lines.push(String::new());
    lines.push("**DO NOT**:".to_string());
    lines.push(
        "- Give a recommendation on whether to buy, sell, or hold the stock. That is produced later in the workflow."
            .to_string(),
    );
    lines.push(do_not(domain).to_string());
    lines.push("**DO**:".to_string());
    lines.push(focus(domain).to_string());
    lines.push(
        "- Focus more on trends seen in the most recent periods than on older history.".to_string(),
    );

    lines.join("\n")
}

pub(crate) fn bound(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.to_string())
        .unwrap_or_else(|| "unbounded".to_string())
}
