//! Per-domain analysis: one fetch, one prompt, one completion call. Every failure is contained
//! in the task and reported as an absent result.

pub mod prompts;
pub mod task;

use crate::ingest::error::FetchError;
use crate::ingest::types::Domain;
use crate::llm::error::CompletionError;
use crate::llm::Usage;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use task::AnalysisTask;

pub const TASK_TEMPERATURE: f32 = 0.7;
pub const TASK_MAX_TOKENS: u32 = 8192;

const DEFAULT_PRIMARY_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_SECONDARY_MODEL: &str = "claude-3-7-sonnet-20250219";

/// Analysis domains in the order they are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDomain {
    Metrics,
    Statements,
    News,
    WebContext,
}

impl AnalysisDomain {
    pub const ALL: [AnalysisDomain; 4] = [
        AnalysisDomain::Metrics,
        AnalysisDomain::Statements,
        AnalysisDomain::News,
        AnalysisDomain::WebContext,
    ];

    /// Provider data backing the task. Web context is built from recent price action.
    pub fn source(&self) -> Domain {
        match self {
            AnalysisDomain::Metrics => Domain::Metrics,
            AnalysisDomain::Statements => Domain::Statements,
            AnalysisDomain::News => Domain::News,
            AnalysisDomain::WebContext => Domain::Prices,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisDomain::Metrics => "metrics",
            AnalysisDomain::Statements => "statements",
            AnalysisDomain::News => "news",
            AnalysisDomain::WebContext => "web-context",
        }
    }
}

impl fmt::Display for AnalysisDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record limits per provider domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainLimits {
    pub metrics: u32,
    pub statements: u32,
    pub news: u32,
    pub prices: u32,
}

impl Default for DomainLimits {
    fn default() -> Self {
        Self {
            metrics: 4,
            statements: 4,
            news: 10,
            prices: 30,
        }
    }
}

impl DomainLimits {
    pub fn for_domain(&self, domain: Domain) -> u32 {
        match domain {
            Domain::Metrics => self.metrics,
            Domain::Statements => self.statements,
            Domain::News => self.news,
            Domain::Prices => self.prices,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub metrics: String,
    pub statements: String,
    pub news: String,
    pub web_context: String,
    pub synthesis: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            metrics: DEFAULT_PRIMARY_MODEL.to_string(),
            statements: DEFAULT_SECONDARY_MODEL.to_string(),
            news: DEFAULT_SECONDARY_MODEL.to_string(),
            web_context: DEFAULT_SECONDARY_MODEL.to_string(),
            synthesis: DEFAULT_PRIMARY_MODEL.to_string(),
        }
    }
}

impl ModelConfig {
    pub fn for_domain(&self, domain: AnalysisDomain) -> &str {
        match domain {
            AnalysisDomain::Metrics => &self.metrics,
            AnalysisDomain::Statements => &self.statements,
            AnalysisDomain::News => &self.news,
            AnalysisDomain::WebContext => &self.web_context,
        }
    }
}

/// Output of one task: usable narrative text or a well-defined absence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisResult {
    Narrative { text: String },
    Absent { reason: String },
}

impl AnalysisResult {
    pub fn narrative(&self) -> Option<&str> {
        match self {
            AnalysisResult::Narrative { text } => Some(text),
            AnalysisResult::Absent { .. } => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TaskFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("model returned no narrative text")]
    EmptyNarrative,
}

/// Settled task with the bookkeeping kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub domain: AnalysisDomain,
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub records_used: usize,
    pub records_dropped: usize,
    pub usage: Usage,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, AnalysisResult::Narrative { .. })
    }
}
