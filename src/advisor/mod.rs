pub mod anthropic;
pub mod fallback;
pub mod openai;
pub mod parser;
pub mod prompt;

use crate::analysis::risk;
use crate::config::LlmSettings;
use crate::errors::{AppError, AppResult};
use crate::models::{Provider, StoreReport, StrategySuggestion, SuggestionSource};
use crate::redaction::Redactor;
use serde_json::Value;
use std::time::Duration;

pub use anthropic::AnthropicAdapter;
pub use openai::OpenAiAdapter;

pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;
    fn api_key(&self) -> &str;
    fn build_request(&self, client: &reqwest::Client, system: &str, prompt: &str) -> reqwest::RequestBuilder;
    fn extract_text(&self, body: &Value) -> Option<String>;
}

pub struct StrategyAdvisor {
    client: reqwest::Client,
    adapter: Option<Box<dyn ProviderAdapter>>,
    timeout: Duration,
    redactor: Redactor,
}

impl StrategyAdvisor {
    pub fn from_settings(settings: &LlmSettings) -> AppResult<Self> {
        Self::with_adapter(select_adapter(settings), settings.timeout_seconds)
    }

    #[cfg(test)]
    pub(crate) fn fallback_only() -> Self {
        Self {
            client: reqwest::Client::new(),
            adapter: None,
            timeout: Duration::from_secs(LlmSettings::default().timeout_seconds),
            redactor: Redactor::default(),
        }
    }

    pub fn with_adapter(adapter: Option<Box<dyn ProviderAdapter>>, timeout_seconds: u64) -> AppResult<Self> {
        let timeout = Duration::from_secs(timeout_seconds);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| AppError::Config(format!("failed to build LLM HTTP client: {}", error)))?;
        let redactor = Redactor::new(adapter.iter().map(|adapter| adapter.api_key().to_string()));
        Ok(Self {
            client,
            adapter,
            timeout,
            redactor,
        })
    }

    pub fn provider(&self) -> Option<Provider> {
        self.adapter.as_ref().map(|adapter| adapter.provider())
    }

    pub async fn suggest(&self, report: &StoreReport) -> StrategySuggestion {
        let score = risk::sanitize_score(Some(report.risk_score));
        let Some(adapter) = self.adapter.as_deref() else {
            return fallback::default_strategy(score);
        };

        let prompt = prompt::build_prompt(report);
        let outcome = tokio::time::timeout(self.timeout, self.request(adapter, &prompt)).await;
        let reply = match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(error)) => {
                let redacted = self.redactor.redact(&error.to_string());
                tracing::warn!(
                    provider = adapter.provider().as_str(),
                    store_id = %report.store_info.id,
                    error = %redacted.content,
                    "LLM request failed; using fallback strategy"
                );
                return fallback::default_strategy(score);
            }
            Err(_) => {
                tracing::warn!(
                    provider = adapter.provider().as_str(),
                    store_id = %report.store_info.id,
                    timeout_secs = self.timeout.as_secs(),
                    "LLM request timed out; using fallback strategy"
                );
                return fallback::default_strategy(score);
            }
        };

        match parser::parse_strategy_reply(&reply) {
            Ok(bundle) => StrategySuggestion {
                summary: bundle.summary,
                strategies: bundle.strategies,
                source: SuggestionSource::Llm,
            },
            Err(error) => {
                tracing::warn!(
                    provider = adapter.provider().as_str(),
                    store_id = %report.store_info.id,
                    error = %error,
                    "LLM reply unusable; using fallback strategy"
                );
                fallback::default_strategy(score)
            }
        }
    }

    async fn request(&self, adapter: &dyn ProviderAdapter, prompt: &str) -> AppResult<String> {
        let response = adapter
            .build_request(&self.client, prompt::SYSTEM_PROMPT, prompt)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(AppError::Advisor(format!("provider returned {}: {}", status, excerpt)));
        }
        let body: Value = response.json().await?;
        adapter
            .extract_text(&body)
            .ok_or_else(|| AppError::Advisor("provider returned an empty completion".to_string()))
    }
}

fn select_adapter(settings: &LlmSettings) -> Option<Box<dyn ProviderAdapter>> {
    let usable = |key: &Option<String>| key.as_deref().map(str::trim).filter(|key| !key.is_empty()).map(str::to_string);
    if let Some(key) = usable(&settings.openai_api_key) {
        return Some(Box::new(OpenAiAdapter::new(key, settings)));
    }
    if let Some(key) = usable(&settings.anthropic_api_key) {
        return Some(Box::new(AnthropicAdapter::new(key, settings)));
    }
    tracing::warn!("no LLM API key configured; strategy suggestions use the static fallback");
    None
}
