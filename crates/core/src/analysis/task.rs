use crate::analysis::prompts;
use crate::analysis::{
    AnalysisDomain, AnalysisResult, TaskFailure, TaskOutcome, TASK_MAX_TOKENS, TASK_TEMPERATURE,
};
use crate::domain::request::AnalysisRequest;
use crate::ingest::error::FetchError;
use crate::ingest::provider::DataProviderClient;
use crate::ingest::types::ValidatedBatch;
use crate::llm::retry::CompletionClient;
use crate::llm::{CompletionRequest, Message, Sampling, Usage};
use std::sync::Arc;

/// One domain's fetch-then-analyze unit of work.
#[derive(Clone)]
pub struct AnalysisTask {
    domain: AnalysisDomain,
    request: AnalysisRequest,
    model: String,
    data: Arc<dyn DataProviderClient>,
    llm: CompletionClient,
}

impl AnalysisTask {
    pub fn new(
        domain: AnalysisDomain,
        request: AnalysisRequest,
        model: impl Into<String>,
        data: Arc<dyn DataProviderClient>,
        llm: CompletionClient,
    ) -> Self {
        Self {
            domain,
            request,
            model: model.into(),
            data,
            llm,
        }
    }

    /// Runs the task to completion. Fetch and completion failures become an absent result.
    pub async fn run(&self) -> TaskOutcome {
        let batch = match self.data.fetch(self.domain.source(), &self.request).await {
            Ok(batch) => batch,
            Err(err) => {
                let dropped = match &err {
                    FetchError::AllRecordsInvalid { dropped, .. } => *dropped,
                    _ => 0,
                };
                return self.absent(err.into(), 0, dropped, Usage::default());
            }
        };

        let used = batch.valid_count();
        let dropped = batch.dropped;
        let res = match self.llm.complete(&self.completion_request(&batch)).await {
            Ok(res) => res,
            Err(err) => return self.absent(err.into(), used, dropped, Usage::default()),
        };

        let text = res.text().trim();
        if text.is_empty() {
            return self.absent(TaskFailure::EmptyNarrative, used, dropped, res.usage);
        }

        tracing::info!(
            domain = %self.domain,
            ticker = %self.request.ticker,
            records = used,
            dropped,
            output_tokens = res.usage.output_tokens,
            "analysis task complete"
        );
        TaskOutcome {
            domain: self.domain,
            result: AnalysisResult::Narrative {
                text: text.to_string(),
            },
            records_used: used,
            records_dropped: dropped,
            usage: res.usage,
        }
    }

    fn completion_request(&self, batch: &ValidatedBatch) -> CompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = prompts::system_prompt(self.domain) {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(prompts::user_prompt(
            self.domain,
            &self.request,
            batch,
        )));

        CompletionRequest {
            model: self.model.clone(),
            messages,
            sampling: Sampling::new(TASK_TEMPERATURE, TASK_MAX_TOKENS),
        }
    }

    fn absent(
        &self,
        failure: TaskFailure,
        records_used: usize,
        records_dropped: usize,
        usage: Usage,
    ) -> TaskOutcome {
        let reason = failure.to_string();
        tracing::warn!(
            domain = %self.domain,
            ticker = %self.request.ticker,
            %reason,
            "analysis task produced no narrative"
        );
        TaskOutcome {
            domain: self.domain,
            result: AnalysisResult::Absent { reason },
            records_used,
            records_dropped,
            usage,
        }
    }
}
