use super::ProviderAdapter;
use crate::config::LlmSettings;
use crate::models::Provider;
use serde_json::Value;

const MESSAGES_PATH: &str = "/v1/messages";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicAdapter {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f64,
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>, settings: &LlmSettings) -> Self {
        Self {
            api_key: api_key.into(),
            model: settings.anthropic_model.clone(),
            base_url: settings.anthropic_base_url.trim_end_matches('/').to_string(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn api_key(&self) -> &str {
        &self.api_key
    }

    fn build_request(&self, client: &reqwest::Client, system: &str, prompt: &str) -> reqwest::RequestBuilder {
        client
            .post(format!("{}{}", self.base_url, MESSAGES_PATH))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&serde_json::json!({
                "model": self.model,
                "system": system,
                "max_tokens": self.max_tokens,
                "temperature": self.temperature,
                "messages": [
                    { "role": "user", "content": prompt }
                ]
            }))
    }

    fn extract_text(&self, body: &Value) -> Option<String> {
        body.get("content")?
            .as_array()?
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str).unwrap_or("text") == "text")
            .find_map(|block| block.get("text").and_then(Value::as_str))
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }
}
