use super::ProviderAdapter;
use crate::config::LlmSettings;
use crate::models::Provider;
use serde_json::Value;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f64,
}

impl OpenAiAdapter {
    pub fn new(api_key: impl Into<String>, settings: &LlmSettings) -> Self {
        Self {
            api_key: api_key.into(),
            model: settings.openai_model.clone(),
            base_url: settings.openai_base_url.trim_end_matches('/').to_string(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }
}

impl ProviderAdapter for OpenAiAdapter {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn api_key(&self) -> &str {
        &self.api_key
    }

    fn build_request(&self, client: &reqwest::Client, system: &str, prompt: &str) -> reqwest::RequestBuilder {
        client
            .post(format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": prompt }
                ],
                "temperature": self.temperature,
                "max_tokens": self.max_tokens
            }))
    }

    fn extract_text(&self, body: &Value) -> Option<String> {
        body.get("choices")?
            .as_array()?
            .first()?
            .get("message")?
            .get("content")?
            .as_str()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }
}
