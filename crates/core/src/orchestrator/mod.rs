//! Fan-out of the domain analysis tasks, fan-in into one synthesis call.
//!
//! A run moves through `Dispatched` (all tasks started), `Collected` (all tasks settled) and
//! `Synthesized`. Domain failures are contained in their task outcome; only a synthesis failure
//! fails the run, and even then every task outcome is returned with the error.

pub mod synthesis;

use crate::analysis::{AnalysisDomain, AnalysisTask, DomainLimits, ModelConfig, TaskOutcome};
use crate::config::Settings;
use crate::domain::recommendation::Recommendation;
use crate::domain::request::{AnalysisRequest, DateRange, Period, Ticker};
use crate::ingest::provider::{DataProviderClient, FinancialDatasetsClient};
use crate::llm::anthropic::AnthropicClient;
use crate::llm::retry::CompletionClient;
use crate::llm::Usage;
use futures::future::join_all;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

pub use synthesis::SynthesisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Dispatched,
    Collected,
    Synthesized,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Dispatched => "dispatched",
            Phase::Collected => "collected",
            Phase::Synthesized => "synthesized",
        })
    }
}

/// Top-level run parameters shared by every domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestrationInput {
    pub ticker: Ticker,
    pub range: DateRange,
    pub period: Period,
}

impl OrchestrationInput {
    /// Parses raw invocation arguments. Period defaults to quarterly.
    pub fn parse(
        ticker: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
        period: Option<&str>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            ticker: Ticker::parse(ticker)?,
            range: DateRange::parse(start_date, end_date)?,
            period: period
                .map(str::parse)
                .transpose()?
                .unwrap_or(Period::Quarterly),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationReport {
    pub run_id: Uuid,
    pub ticker: Ticker,
    pub period: Period,
    pub range: DateRange,
    pub tasks: Vec<TaskOutcome>,
    pub recommendation: Recommendation,
    pub synthesis_text: String,
    pub usage: Usage,
}

impl OrchestrationReport {
    pub fn unavailable_domains(&self) -> Vec<AnalysisDomain> {
        self.tasks
            .iter()
            .filter(|t| !t.is_success())
            .map(|t| t.domain)
            .collect()
    }
}

/// Terminal failure of a run. Carries every task outcome so nothing is lost for audit.
#[derive(Debug, thiserror::Error)]
#[error("synthesis failed for {ticker} (run {run_id})")]
pub struct SynthesisFailure {
    pub run_id: Uuid,
    pub ticker: Ticker,
    #[source]
    pub cause: SynthesisError,
    pub tasks: Vec<TaskOutcome>,
    pub usage: Usage,
}

impl SynthesisFailure {
    pub fn report(&self) -> FailureReport<'_> {
        FailureReport {
            run_id: self.run_id,
            ticker: &self.ticker,
            error: self.cause.to_string(),
            tasks: &self.tasks,
            usage: self.usage,
        }
    }
}

/// Serializable view of a failed run.
#[derive(Debug, Serialize)]
pub struct FailureReport<'a> {
    pub run_id: Uuid,
    pub ticker: &'a Ticker,
    pub error: String,
    pub tasks: &'a [TaskOutcome],
    pub usage: Usage,
}

#[derive(Clone)]
pub struct Orchestrator {
    data: Arc<dyn DataProviderClient>,
    llm: CompletionClient,
    models: ModelConfig,
    limits: DomainLimits,
}

impl Orchestrator {
    pub fn new(data: Arc<dyn DataProviderClient>, llm: CompletionClient) -> Self {
        Self {
            data,
            llm,
            models: ModelConfig::default(),
            limits: DomainLimits::default(),
        }
    }

    /// Production wiring: Financial Datasets for data, Anthropic for completions.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let data = FinancialDatasetsClient::new(settings.data_provider_config()?)?;
        let llm = AnthropicClient::new(settings.anthropic_config()?)?;
        Ok(
            Self::new(Arc::new(data), CompletionClient::new(Arc::new(llm)))
                .with_limits(settings.limits),
        )
    }

    pub fn with_models(mut self, models: ModelConfig) -> Self {
        self.models = models;
        self
    }

    pub fn with_limits(mut self, limits: DomainLimits) -> Self {
        self.limits = limits;
        self
    }

    /// One request per domain: same ticker, period and range; domain-specific limit.
    pub fn request_for(&self, domain: AnalysisDomain, input: &OrchestrationInput) -> AnalysisRequest {
        AnalysisRequest {
            ticker: input.ticker.clone(),
            period: input.period,
            limit: self.limits.for_domain(domain.source()),
            range: input.range,
        }
    }

    pub async fn run(
        &self,
        input: &OrchestrationInput,
    ) -> Result<OrchestrationReport, SynthesisFailure> {
        let run_id = Uuid::new_v4();

        let tasks: Vec<AnalysisTask> = AnalysisDomain::ALL
            .iter()
            .map(|&domain| {
                AnalysisTask::new(
                    domain,
                    self.request_for(domain, input),
                    self.models.for_domain(domain),
                    Arc::clone(&self.data),
                    self.llm.clone(),
                )
            })
            .collect();

        tracing::info!(
            %run_id,
            ticker = %input.ticker,
            phase = %Phase::Dispatched,
            tasks = tasks.len(),
            provider = self.data.provider_name(),
            llm = self.llm.provider_name(),
            "orchestration phase"
        );

        let mut outcomes = join_all(tasks.iter().map(|task| task.run())).await;
        outcomes.sort_by_key(|o| o.domain);

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        tracing::info!(
            %run_id,
            ticker = %input.ticker,
            phase = %Phase::Collected,
            succeeded,
            absent = outcomes.len() - succeeded,
            "orchestration phase"
        );

        let mut usage = Usage::default();
        for outcome in &outcomes {
            usage += outcome.usage;
        }

        match synthesis::synthesize(
            &self.llm,
            &self.models.synthesis,
            input,
            &outcomes,
            &mut usage,
        )
        .await
        {
            Ok(done) => {
                tracing::info!(
                    %run_id,
                    ticker = %input.ticker,
                    phase = %Phase::Synthesized,
                    direction = %done.recommendation.direction,
                    confidence = done.recommendation.confidence,
                    "orchestration phase"
                );
                Ok(OrchestrationReport {
                    run_id,
                    ticker: input.ticker.clone(),
                    period: input.period,
                    range: input.range,
                    tasks: outcomes,
                    recommendation: done.recommendation,
                    synthesis_text: done.text,
                    usage,
                })
            }
            Err(cause) => {
                tracing::error!(
                    %run_id,
                    ticker = %input.ticker,
                    phase = %Phase::Synthesized,
                    error = %cause,
                    "synthesis failed"
                );
                Err(SynthesisFailure {
                    run_id,
                    ticker: input.ticker.clone(),
                    cause,
                    tasks: outcomes,
                    usage,
                })
            }
        }
    }
}
