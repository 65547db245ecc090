use crate::llm::error::CompletionError;
use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, Role};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&config.api_key).context("invalid Anthropic API key")?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            base_url: config.base_url,
            headers,
        })
    }

    fn wire_request(request: &CompletionRequest) -> CreateMessageRequest<'_> {
        // The Messages API takes system turns as a top-level field, not in `messages`.
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let messages = request
            .messages
            .iter()
            .filter_map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => return None,
                };
                Some(WireMessage {
                    role,
                    content: &m.content,
                })
            })
            .collect();

        let sampling = &request.sampling;
        CreateMessageRequest {
            model: &request.model,
            max_tokens: sampling.max_tokens,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages,
            temperature: sampling.temperature,
            stop_sequences: &sampling.stop_sequences,
            top_p: sampling.top_p,
            top_k: sampling.top_k,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    fn provider_name(&self) -> &'static str {
        "anthropic"
    }

    async fn send(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(self.headers.clone())
            .json(&Self::wire_request(request))
            .send()
            .await
            .map_err(CompletionError::from_reqwest)?;

        let status = res.status();
        let text = res.text().await.map_err(CompletionError::from_reqwest)?;
        if !status.is_success() {
            return Err(CompletionError::Provider {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed = serde_json::from_str::<CompletionResponse>(&text).map_err(|err| {
            CompletionError::Schema {
                detail: err.to_string(),
                raw: text.clone(),
            }
        })?;

        tracing::debug!(
            model = %parsed.model,
            stop_reason = parsed.stop_reason.as_deref().unwrap_or("none"),
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "Anthropic message complete"
        );
        Ok(parsed)
    }
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop_sequences: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}
