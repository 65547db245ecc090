use crate::llm::error::CompletionError;
use crate::llm::{CompletionRequest, CompletionResponse, LlmClient};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before retry `n` is `base_delay * 2^n`, with `n` starting at 0.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Completion calls with bounded exponential backoff on transient transport failures.
///
/// Only [`CompletionError::Transient`] is retried. Provider errors, request errors and schema
/// mismatches return on the first occurrence; after the last retry the final transient error is
/// returned as is.
#[derive(Clone)]
pub struct CompletionClient {
    llm: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl CompletionClient {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self::with_policy(llm, RetryPolicy::default())
    }

    pub fn with_policy(llm: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { llm, policy }
    }

    pub fn provider_name(&self) -> &'static str {
        self.llm.provider_name()
    }

    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let mut attempt: u32 = 0;
        loop {
            match self.llm.send(request).await {
                Ok(res) => return Ok(res),
                Err(err) if err.is_transient() && attempt < self.policy.max_retries => {
                    let backoff = self.policy.backoff(attempt);
                    tracing::warn!(
                        provider = self.llm.provider_name(),
                        model = %request.model,
                        attempt,
                        ?backoff,
                        error = %err,
                        "transient LLM failure; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted results in order and records every request it receives.
    #[derive(Default)]
    pub struct ScriptedLlm {
        script: Mutex<VecDeque<Result<CompletionResponse, CompletionError>>>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        pub fn new(script: Vec<Result<CompletionResponse, CompletionError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                requests: Mutex::default(),
            }
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlm {
        fn provider_name(&self) -> &'static str {
            "scripted"
        }

        async fn send(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            self.requests.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CompletionError::Request("script exhausted".into())))
        }
    }

    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            id: "msg_test".to_string(),
            model: "claude-test".to_string(),
            content: vec![crate::llm::ContentBlock::Text {
                text: text.to_string(),
            }],
            stop_reason: Some("end_turn".to_string()),
            usage: crate::llm::Usage {
                input_tokens: 100,
                output_tokens: 20,
            },
        }
    }

    pub fn timeout() -> CompletionError {
        CompletionError::Transient {
            kind: crate::llm::error::TransientKind::Timeout,
            detail: "operation timed out".to_string(),
        }
    }
}
