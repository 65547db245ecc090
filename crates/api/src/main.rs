use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use finsynth_core::orchestrator::{OrchestrationInput, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = finsynth_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let orchestrator = match Orchestrator::from_settings(&settings) {
        Ok(_) => {
            let settings = settings.clone();
            let factory: OrchestratorFactory =
                Arc::new(move || Orchestrator::from_settings(&settings));
            Some(factory)
        }
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "analysis clients unavailable; starting API in degraded mode");
            None
        }
    };

    let app = app(AppState { orchestrator });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/analyses", post(create_analysis))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

/// Builds the clients for one run. Clients live for a single request.
type OrchestratorFactory = Arc<dyn Fn() -> anyhow::Result<Orchestrator> + Send + Sync>;

#[derive(Clone)]
struct AppState {
    orchestrator: Option<OrchestratorFactory>,
}

#[derive(Debug, Deserialize)]
struct AnalysisBody {
    ticker: String,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    period: Option<String>,
}

async fn create_analysis(
    State(state): State<AppState>,
    Json(body): Json<AnalysisBody>,
) -> Response {
    let Some(factory) = &state.orchestrator else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "analysis clients are not configured".to_string(),
        );
    };

    let input = match OrchestrationInput::parse(
        &body.ticker,
        body.start_date.as_deref(),
        body.end_date.as_deref(),
        body.period.as_deref(),
    ) {
        Ok(input) => input,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("{e:#}")),
    };

    let orchestrator = match factory() {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "failed to build analysis clients");
            return error_response(StatusCode::SERVICE_UNAVAILABLE, format!("{e:#}"));
        }
    };

    match orchestrator.run(&input).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(failure) => {
            let res = (StatusCode::BAD_GATEWAY, Json(failure.report())).into_response();
            sentry_anyhow::capture_anyhow(&anyhow::Error::new(failure));
            res
        }
    }
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(serde_json::json!({ "error": error }))).into_response()
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &finsynth_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use finsynth_core::domain::request::AnalysisRequest;
    use finsynth_core::ingest::error::FetchError;
    use finsynth_core::ingest::provider::DataProviderClient;
    use finsynth_core::ingest::types::{Domain, ValidatedBatch};
    use finsynth_core::ingest::validate::decode_batch;
    use finsynth_core::llm::error::CompletionError;
    use finsynth_core::llm::retry::CompletionClient;
    use finsynth_core::llm::{
        CompletionRequest, CompletionResponse, ContentBlock, LlmClient, Usage,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    /// Serves one news item and one price bar; the other domains have no data.
    struct StaticProvider;

    #[async_trait::async_trait]
    impl DataProviderClient for StaticProvider {
        fn provider_name(&self) -> &'static str {
            "static"
        }

        async fn fetch(
            &self,
            domain: Domain,
            _request: &AnalysisRequest,
        ) -> Result<ValidatedBatch, FetchError> {
            let body = match domain {
                Domain::News => json!({"news": [{
                    "ticker": "AAPL",
                    "title": "Apple beats estimates",
                    "source": "Wire",
                    "date": "2024-11-01T12:00:00Z",
                    "url": "https://example.com/a",
                }]}),
                Domain::Prices => json!({"prices": [{
                    "open": 226.0, "close": 227.8, "high": 229.0, "low": 225.1,
                    "volume": 3.1e7, "time": "2024-09-27",
                }]}),
                _ => json!({}),
            };
            decode_batch(domain, body)
        }
    }

    /// Answers task prompts with a narrative and the synthesis prompt with a fixed reply.
    struct CannedLlm {
        synthesis: Result<&'static str, u16>,
    }

    #[async_trait::async_trait]
    impl LlmClient for CannedLlm {
        fn provider_name(&self) -> &'static str {
            "canned"
        }

        async fn send(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            let prompt = request.messages.last().map(|m| m.content.as_str()).unwrap_or("");
            let text = if prompt.starts_with("Task: Produce an investment recommendation") {
                match self.synthesis {
                    Ok(text) => text,
                    Err(status) => {
                        return Err(CompletionError::Provider {
                            status,
                            body: "overloaded".to_string(),
                        })
                    }
                }
            } else {
                "Analysis narrative."
            };
            Ok(CompletionResponse {
                id: "msg_test".to_string(),
                model: request.model.clone(),
                content: vec![ContentBlock::Text {
                    text: text.to_string(),
                }],
                stop_reason: Some("end_turn".to_string()),
                usage: Usage {
                    input_tokens: 10,
                    output_tokens: 5,
                },
            })
        }
    }

    fn state_with(synthesis: Result<&'static str, u16>) -> AppState {
        let factory: OrchestratorFactory = Arc::new(move || {
            Ok(Orchestrator::new(
                Arc::new(StaticProvider),
                CompletionClient::new(Arc::new(CannedLlm { synthesis })),
            ))
        });
        AppState {
            orchestrator: Some(factory),
        }
    }

    const RECOMMENDATION: &str = r#"{"direction": "buy", "target_price_low": 230.0, "target_price_high": 260.0, "rationale": ["earnings beat"], "risks": ["valuation"], "confidence": 0.7}"#;

    async fn post_analysis(state: AppState, body: Value) -> (StatusCode, Value) {
        let res = app(state)
            .oneshot(
                Request::post("/analyses")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn completed_run_returns_report() {
        let (status, body) = post_analysis(
            state_with(Ok(RECOMMENDATION)),
            json!({"ticker": "aapl", "start_date": "2024-01-01"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ticker"], "AAPL");
        assert_eq!(body["recommendation"]["direction"], "buy");

        let tasks = body["tasks"].as_array().unwrap();
        assert_eq!(tasks.len(), 4);
        let statuses: Vec<&str> = tasks
            .iter()
            .map(|t| t["status"].as_str().unwrap())
            .collect();
        assert_eq!(statuses, ["absent", "absent", "narrative", "narrative"]);
        assert_eq!(tasks[2]["text"], "Analysis narrative.");
    }

    #[tokio::test]
    async fn failed_synthesis_returns_every_task_outcome() {
        let (status, body) =
            post_analysis(state_with(Err(400)), json!({"ticker": "AAPL"})).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("HTTP 400"));
        assert_eq!(body["tasks"].as_array().unwrap().len(), 4);
        assert!(body.get("recommendation").is_none());
    }

    #[tokio::test]
    async fn inverted_range_is_bad_request() {
        let (status, body) = post_analysis(
            state_with(Ok(RECOMMENDATION)),
            json!({"ticker": "AAPL", "start_date": "20250101", "end_date": "20240101"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("after"));
    }

    #[tokio::test]
    async fn blank_ticker_is_bad_request() {
        let (status, _) =
            post_analysis(state_with(Ok(RECOMMENDATION)), json!({"ticker": "  "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn degraded_mode_is_service_unavailable() {
        let state = AppState { orchestrator: None };
        let (status, body) = post_analysis(state, json!({"ticker": "AAPL"})).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn client_build_failure_is_service_unavailable() {
        let factory: OrchestratorFactory =
            Arc::new(|| Err(anyhow::anyhow!("missing ANTHROPIC_API_KEY")));
        let state = AppState {
            orchestrator: Some(factory),
        };
        let (status, body) = post_analysis(state, json!({"ticker": "AAPL"})).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("ANTHROPIC_API_KEY"));
    }
}
