pub mod analysis;
pub mod domain;
pub mod ingest;
pub mod llm;
pub mod orchestrator;

pub mod config {
    use crate::analysis::DomainLimits;
    use crate::ingest::provider::DataProviderConfig;
    use crate::llm::anthropic::AnthropicConfig;
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
    const DEFAULT_ANTHROPIC_TIMEOUT_SECS: u64 = 120;
    const DEFAULT_DATA_PROVIDER_BASE_URL: &str = "https://api.financialdatasets.ai";
    const DEFAULT_DATA_PROVIDER_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_PORT: u16 = 3000;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub anthropic_api_key: Option<String>,
        pub anthropic_base_url: String,
        pub anthropic_timeout_secs: u64,
        pub financial_datasets_api_key: Option<String>,
        pub financial_datasets_base_url: String,
        pub financial_datasets_timeout_secs: u64,
        pub sentry_dsn: Option<String>,
        pub port: u16,
        pub limits: DomainLimits,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let defaults = DomainLimits::default();
            Ok(Self {
                anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
                anthropic_base_url: non_empty_var("ANTHROPIC_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.to_string()),
                anthropic_timeout_secs: parsed_var("ANTHROPIC_TIMEOUT_SECS")?
                    .unwrap_or(DEFAULT_ANTHROPIC_TIMEOUT_SECS),
                financial_datasets_api_key: non_empty_var("FINANCIAL_DATASETS_API_KEY"),
                financial_datasets_base_url: non_empty_var("FINANCIAL_DATASETS_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_DATA_PROVIDER_BASE_URL.to_string()),
                financial_datasets_timeout_secs: parsed_var("FINANCIAL_DATASETS_TIMEOUT_SECS")?
                    .unwrap_or(DEFAULT_DATA_PROVIDER_TIMEOUT_SECS),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                port: parsed_var("PORT")?.unwrap_or(DEFAULT_PORT),
                limits: DomainLimits {
                    metrics: parsed_var("ANALYSIS_METRICS_LIMIT")?.unwrap_or(defaults.metrics),
                    statements: parsed_var("ANALYSIS_STATEMENTS_LIMIT")?
                        .unwrap_or(defaults.statements),
                    news: parsed_var("ANALYSIS_NEWS_LIMIT")?.unwrap_or(defaults.news),
                    prices: parsed_var("ANALYSIS_PRICES_LIMIT")?.unwrap_or(defaults.prices),
                },
            })
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_financial_datasets_api_key(&self) -> anyhow::Result<&str> {
            self.financial_datasets_api_key
                .as_deref()
                .context("FINANCIAL_DATASETS_API_KEY is required")
        }

        pub fn anthropic_config(&self) -> anyhow::Result<AnthropicConfig> {
            Ok(AnthropicConfig {
                api_key: self.require_anthropic_api_key()?.to_string(),
                base_url: self.anthropic_base_url.clone(),
                timeout: Duration::from_secs(self.anthropic_timeout_secs),
            })
        }

        pub fn data_provider_config(&self) -> anyhow::Result<DataProviderConfig> {
            Ok(DataProviderConfig {
                api_key: self.require_financial_datasets_api_key()?.to_string(),
                base_url: self.financial_datasets_base_url.clone(),
                timeout: Duration::from_secs(self.financial_datasets_timeout_secs),
            })
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

    fn parsed_var<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        non_empty_var(key)
            .map(|s| s.trim().parse::<T>())
            .transpose()
            .with_context(|| format!("{key} has an invalid value"))
    }
}
