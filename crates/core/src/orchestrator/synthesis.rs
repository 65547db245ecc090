use crate::analysis::prompts::bound;
use crate::analysis::{AnalysisResult, TaskOutcome};
use crate::domain::recommendation::Recommendation;
use crate::llm::error::CompletionError;
use crate::llm::json;
use crate::llm::retry::CompletionClient;
use crate::llm::{CompletionRequest, Message, Sampling, Usage};
use crate::orchestrator::OrchestrationInput;

pub const SYNTHESIS_TEMPERATURE: f32 = 0.7;
pub const SYNTHESIS_MAX_TOKENS: u32 = 4096;
const REPAIR_ATTEMPTS: u32 = 2;

const SCHEMA: [&str; 8] = [
    "{",
    "  \"direction\": \"buy\" | \"hold\" | \"sell\",",
    "  \"target_price_low\": 0.0,",
    "  \"target_price_high\": 0.0,",
    "  \"rationale\": [\"reason 1\", \"reason 2\"],",
    "  \"risks\": [\"risk 1\"],",
    "  \"confidence\": 0.0",
    "}",
];

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("synthesis completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("recommendation still invalid after {attempts} attempts: {detail}")]
    RecommendationInvalid {
        attempts: u32,
        detail: String,
        raw: String,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct Synthesis {
    pub recommendation: Recommendation,
    pub text: String,
}

pub(crate) fn system_prompt() -> String {
    let schema = SCHEMA.join("\n");
    [
        "You are a Chartered Financial Analyst (CFA) producing the final investment call for one stock.",
        "You receive independent analyses written by other analysts. Some may be unavailable; weigh only what is provided.",
        "Return ONLY one valid JSON object. No markdown, no prose, no extra keys.",
        "Output schema:",
        schema.as_str(),
        "Rules:",
        "- direction must be one of buy, hold, sell",
        "- target_price_low and target_price_high are both set or both null; low <= high",
        "- rationale must contain at least one non-empty line",
        "- confidence must be in [0, 1]",
    ]
    .join("\n")
}

/// Narratives in stable domain order. Absent tasks are named, not omitted.
pub(crate) fn user_prompt(input: &OrchestrationInput, outcomes: &[TaskOutcome]) -> String {
    let mut sorted: Vec<&TaskOutcome> = outcomes.iter().collect();
    sorted.sort_by_key(|o| o.domain);

    let mut out = format!(
        "Task: Produce an investment recommendation for {}.\n\
- Period: {}\n\
- Start date: {}\n\
- End date: {}\n",
        input.ticker,
        input.period,
        bound(input.range.start),
        bound(input.range.end),
    );

    for outcome in sorted {
        out.push('\n');
        match &outcome.result {
            AnalysisResult::Narrative { text } => {
                out.push_str(&format!("## {} analysis\n{}\n", outcome.domain, text));
            }
            AnalysisResult::Absent { .. } => {
                out.push_str(&format!(
                    "## {} analysis\nno {} analysis available\n",
                    outcome.domain, outcome.domain
                ));
            }
        }
    }
    out
}

fn repair_prompt(previous_output: &str) -> String {
    format!(
        "Your previous message was NOT a valid recommendation.\n\n\
TASK: Output ONLY a single JSON object that exactly matches the schema and rules.\n\
- Do NOT include any markdown, prose, or code fences.\n\
- Do NOT include trailing commas or comments.\n\
- confidence MUST be a number in [0, 1].\n\n\
SCHEMA:\n{}\n\n\
INVALID OUTPUT (for reference only; DO NOT copy verbatim):\n{previous_output}",
        SCHEMA.join("\n")
    )
}

fn request(model: &str, user: String, max_tokens: u32) -> CompletionRequest {
    CompletionRequest {
        model: model.to_string(),
        messages: vec![Message::system(system_prompt()), Message::user(user)],
        sampling: Sampling::new(SYNTHESIS_TEMPERATURE, max_tokens),
    }
}

/// Final aggregation call. Token usage of every attempt is added to `usage`, including failed ones.
pub(crate) async fn synthesize(
    llm: &CompletionClient,
    model: &str,
    input: &OrchestrationInput,
    outcomes: &[TaskOutcome],
    usage: &mut Usage,
) -> Result<Synthesis, SynthesisError> {
    let prompt = user_prompt(input, outcomes);
    let mut res = llm
        .complete(&request(model, prompt.clone(), SYNTHESIS_MAX_TOKENS))
        .await?;
    *usage += res.usage;

    // If the model hit max_tokens, retry once with a higher ceiling.
    if res.hit_max_tokens() {
        let bumped = SYNTHESIS_MAX_TOKENS.saturating_mul(2).max(4096);
        tracing::warn!(
            ticker = %input.ticker,
            from = SYNTHESIS_MAX_TOKENS,
            to = bumped,
            "synthesis stop_reason=max_tokens; retrying once with higher max_tokens"
        );
        res = llm.complete(&request(model, prompt, bumped)).await?;
        *usage += res.usage;
    }

    let mut last_text = res.text().to_string();
    let mut last_err = match json::parse_recommendation(&last_text) {
        Ok(recommendation) => {
            return Ok(Synthesis {
                recommendation,
                text: last_text,
            })
        }
        Err(err) => err,
    };

    for attempt in 1..=REPAIR_ATTEMPTS {
        tracing::warn!(
            attempt,
            ticker = %input.ticker,
            error = %last_err,
            "synthesis output invalid; requesting repair"
        );
        let repair = request(model, repair_prompt(&last_text), SYNTHESIS_MAX_TOKENS);
        let res = llm.complete(&repair).await?;
        *usage += res.usage;

        last_text = res.text().to_string();
        match json::parse_recommendation(&last_text) {
            Ok(recommendation) => {
                return Ok(Synthesis {
                    recommendation,
                    text: last_text,
                })
            }
            Err(err) => last_err = err,
        }
    }

    Err(SynthesisError::RecommendationInvalid {
        attempts: REPAIR_ATTEMPTS + 1,
        detail: format!("{last_err:#}"),
        raw: last_text,
    })
}
