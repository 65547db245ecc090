use crate::domain::request::AnalysisRequest;
use crate::ingest::error::FetchError;
use crate::ingest::types::{Domain, ValidatedBatch};
use crate::ingest::validate::decode_batch;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-api-key";
const PRICE_INTERVAL: &str = "day";
const PRICE_INTERVAL_MULTIPLIER: &str = "1";

#[async_trait::async_trait]
pub trait DataProviderClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// One GET against the domain's endpoint. Not retried.
    async fn fetch(
        &self,
        domain: Domain,
        request: &AnalysisRequest,
    ) -> Result<ValidatedBatch, FetchError>;
}

#[derive(Debug, Clone)]
pub struct DataProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct FinancialDatasetsClient {
    http: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
}

impl FinancialDatasetsClient {
    pub fn new(config: DataProviderConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(&config.api_key).context("invalid data provider API key")?,
        );

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build data provider http client")?;

        Ok(Self {
            http,
            base_url: config.base_url,
            headers,
        })
    }

    fn url(&self, domain: Domain) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), domain.endpoint())
    }
}

#[async_trait::async_trait]
impl DataProviderClient for FinancialDatasetsClient {
    fn provider_name(&self) -> &'static str {
        "financial_datasets"
    }

    async fn fetch(
        &self,
        domain: Domain,
        request: &AnalysisRequest,
    ) -> Result<ValidatedBatch, FetchError> {
        let res = self
            .http
            .get(self.url(domain))
            .headers(self.headers.clone())
            .query(&query_params(domain, request))
            .send()
            .await
            .map_err(|err| FetchError::Transport {
                domain,
                detail: err.to_string(),
            })?;

        let status = res.status();
        let text = res.text().await.map_err(|err| FetchError::Transport {
            domain,
            detail: format!("failed to read response body: {err}"),
        })?;

        if !status.is_success() {
            return Err(FetchError::Upstream {
                domain,
                status: status.as_u16(),
                body: text,
            });
        }

        let body = serde_json::from_str::<serde_json::Value>(&text).map_err(|err| {
            FetchError::Decode {
                domain,
                detail: err.to_string(),
            }
        })?;

        let batch = decode_batch(domain, body)?;
        tracing::debug!(
            %domain,
            ticker = %request.ticker,
            valid = batch.valid_count(),
            dropped = batch.dropped,
            "provider fetch complete"
        );
        Ok(batch)
    }
}

/// Query string for one domain. Unset optional bounds are left out entirely.
pub fn query_params(domain: Domain, request: &AnalysisRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![("ticker", request.ticker.to_string())];

    let (lower, upper) = match domain {
        Domain::Metrics | Domain::Statements => {
            params.push(("period", request.period.to_string()));
            ("report_period_gte", "report_period_lte")
        }
        Domain::News => ("start_date", "end_date"),
        Domain::Prices => {
            params.push(("interval", PRICE_INTERVAL.to_string()));
            params.push(("interval_multiplier", PRICE_INTERVAL_MULTIPLIER.to_string()));
            ("start_date", "end_date")
        }
    };

    params.push(("limit", request.limit.to_string()));
    if let Some(start) = request.range.start {
        params.push((lower, start.format("%Y-%m-%d").to_string()));
    }
    if let Some(end) = request.range.end {
        params.push((upper, end.format("%Y-%m-%d").to_string()));
    }
    params
}
