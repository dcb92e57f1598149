// Configuration structs
//
// Mirrors the `.knowledgeprism.json` marker file. Every section and field is
// optional on disk; missing values fall back to the defaults in `constants`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::constants::*;
use super::loader::ConfigError;

/// Top-level knowledge base configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Display name of the knowledge base
    #[serde(default = "default_name")]
    pub name: String,

    /// Model endpoint settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Pipeline tuning
    #[serde(default)]
    pub process: ProcessConfig,
}

fn default_name() -> String {
    "Knowledge Prism".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            api: ApiConfig::default(),
            process: ProcessConfig::default(),
        }
    }
}

/// OpenAI-compatible endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiConfig {
    /// Base URL without the `/chat/completions` suffix (e.g. `http://host:8888/v1`)
    pub base_url: String,

    pub model: String,

    /// Sent as `Authorization: Bearer <api_key>`
    pub api_key: String,

    /// Overrides the built-in system prompt when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            system_prompt: None,
        }
    }
}

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessConfig {
    /// Atom files per grouping call
    pub batch_size: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Model call timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ProcessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Fresh configuration for a newly initialised knowledge base
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// System prompt for model calls (configured override or built-in default)
    pub fn system_prompt(&self) -> &str {
        self.api
            .system_prompt
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    /// Replace empty strings with defaults (an empty `apiKey` in the file means "unset")
    pub(crate) fn fill_empty_defaults(&mut self) {
        let defaults = ApiConfig::default();
        if self.api.base_url.trim().is_empty() {
            self.api.base_url = defaults.base_url;
        }
        if self.api.model.trim().is_empty() {
            self.api.model = defaults.model;
        }
        if self.api.api_key.trim().is_empty() {
            self.api.api_key = defaults.api_key;
        }
        if self.name.trim().is_empty() {
            self.name = default_name();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.process.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "process.batchSize must be at least 1".to_string(),
            ));
        }
        if self.process.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "process.timeoutMs must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.process.temperature) {
            return Err(ConfigError::Invalid(format!(
                "process.temperature must be between 0 and 2 (got {})",
                self.process.temperature
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.process.batch_size, 5);
        assert_eq!(config.process.timeout(), Duration::from_secs(1800));
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"name":"KB","process":{"batchSize":2}}"#).unwrap();
        assert_eq!(config.name, "KB");
        assert_eq!(config.process.batch_size, 2);
        assert_eq!(config.process.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.api.base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_camel_case_round_trip() {
        let json = serde_json::to_string(&Config::named("Notes")).unwrap();
        assert!(json.contains("\"baseUrl\""));
        assert!(json.contains("\"timeoutMs\""));
        assert!(!json.contains("systemPrompt"));
    }

    #[test]
    fn test_fill_empty_defaults() {
        let mut config: Config =
            serde_json::from_str(r#"{"api":{"apiKey":"","model":" "}}"#).unwrap();
        config.fill_empty_defaults();
        assert_eq!(config.api.api_key, DEFAULT_API_KEY);
        assert_eq!(config.api.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = Config::default();
        config.process.batch_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_system_prompt_override() {
        let mut config = Config::default();
        assert_eq!(config.system_prompt(), DEFAULT_SYSTEM_PROMPT);
        config.api.system_prompt = Some("Be terse.".to_string());
        assert_eq!(config.system_prompt(), "Be terse.");
    }
}
