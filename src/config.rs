use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "FRANCHISE_RISK_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "config.yaml";
const MIN_LLM_TIMEOUT_SECONDS: u64 = 1;
const MAX_LLM_TIMEOUT_SECONDS: u64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSpec {
    pub feature: String,
    pub display_name: String,
    pub unit: String,
    #[serde(default)]
    pub higher_is_better: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_model: String,
    pub anthropic_model: String,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub timeout_seconds: u64,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            anthropic_api_key: None,
            openai_model: "gpt-4".to_string(),
            anthropic_model: "claude-3-sonnet-20240229".to_string(),
            openai_base_url: "https://api.openai.com".to_string(),
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            timeout_seconds: 20,
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub data_dir: PathBuf,
    pub bind_addr: String,
    pub log_dir: Option<PathBuf>,
    pub frontend_origins: Vec<String>,
    pub indicator_limit: usize,
    pub cluster_indicators: BTreeMap<u32, Vec<IndicatorSpec>>,
    pub llm: LlmSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "0.0.0.0:8000".to_string(),
            log_dir: None,
            frontend_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
            ],
            indicator_limit: 5,
            cluster_indicators: BTreeMap::new(),
            llm: LlmSettings::default(),
        }
    }
}

impl AppSettings {
    pub fn load() -> AppResult<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut settings = Self::from_file(&path)?;
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw)
            .map_err(|error| AppError::Config(format!("{}: {}", path.display(), error)))
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = lookup("DATA_DIR") {
            self.data_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("BIND_ADDR") {
            self.bind_addr = value;
        }
        if let Some(value) = lookup("LOG_DIR") {
            self.log_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("FRONTEND_URL") {
            if !self.frontend_origins.contains(&value) {
                self.frontend_origins.push(value);
            }
        }
        if let Some(value) = lookup("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(value);
        }
        if let Some(value) = lookup("ANTHROPIC_API_KEY") {
            self.llm.anthropic_api_key = Some(value);
        }
        if let Some(value) = lookup("OPENAI_MODEL") {
            self.llm.openai_model = value;
        }
        if let Some(value) = lookup("ANTHROPIC_MODEL") {
            self.llm.anthropic_model = value;
        }
        if let Some(value) = lookup("LLM_TIMEOUT_SECS") {
            match value.trim().parse::<u64>() {
                Ok(seconds) => self.llm.timeout_seconds = seconds,
                Err(_) => tracing::warn!(value = %value, "ignoring non-numeric LLM_TIMEOUT_SECS"),
            }
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.indicator_limit == 0 {
            return Err(AppError::Config("indicatorLimit must be at least 1".to_string()));
        }
        if !(MIN_LLM_TIMEOUT_SECONDS..=MAX_LLM_TIMEOUT_SECONDS).contains(&self.llm.timeout_seconds) {
            return Err(AppError::Config(format!(
                "llm.timeoutSeconds {} is out of allowed range ({}..={})",
                self.llm.timeout_seconds, MIN_LLM_TIMEOUT_SECONDS, MAX_LLM_TIMEOUT_SECONDS
            )));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(AppError::Config(format!(
                "llm.temperature {} is out of allowed range (0..=2)",
                self.llm.temperature
            )));
        }
        for (cluster_id, specs) in &self.cluster_indicators {
            if let Some(spec) = specs.iter().find(|spec| spec.feature.trim().is_empty()) {
                return Err(AppError::Config(format!(
                    "clusterIndicators[{}] entry '{}' has an empty feature",
                    cluster_id, spec.display_name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::AppSettings;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = AppSettings::from_file(&dir.path().join("absent.yaml")).expect("defaults");
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.indicator_limit, 5);
    }

    #[test]
    fn parses_cluster_indicator_map() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "dataDir: /srv/tables\nindicatorLimit: 3\nclusterIndicators:\n  2:\n    - feature: delivery_ratio\n      displayName: 배달 비중\n      unit: \"%\"\n      higherIsBetter: true\nllm:\n  timeoutSeconds: 5\n"
        )
        .expect("write");

        let settings = AppSettings::from_file(file.path()).expect("parse");
        assert_eq!(settings.data_dir.to_string_lossy(), "/srv/tables");
        assert_eq!(settings.indicator_limit, 3);
        assert_eq!(settings.llm.timeout_seconds, 5);
        assert_eq!(settings.llm.openai_model, "gpt-4");
        let specs = settings.cluster_indicators.get(&2).expect("cluster 2");
        assert_eq!(specs[0].feature, "delivery_ratio");
        assert!(specs[0].higher_is_better);
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("DATA_DIR", "/tmp/data"),
            ("OPENAI_API_KEY", "sk-test"),
            ("ANTHROPIC_API_KEY", "   "),
            ("LLM_TIMEOUT_SECS", "9"),
            ("FRONTEND_URL", "https://dash.example.com"),
        ]
        .into_iter()
        .collect();

        let mut settings = AppSettings::default();
        settings.apply_env(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(settings.data_dir.to_string_lossy(), "/tmp/data");
        assert_eq!(settings.llm.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.llm.anthropic_api_key, None);
        assert_eq!(settings.llm.timeout_seconds, 9);
        assert!(settings
            .frontend_origins
            .contains(&"https://dash.example.com".to_string()));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut settings = AppSettings::default();
        settings.llm.timeout_seconds = 0;
        assert!(settings.validate().is_err());

        let mut settings = AppSettings::default();
        settings.indicator_limit = 0;
        assert!(settings.validate().is_err());

        assert!(AppSettings::default().validate().is_ok());
    }
}
