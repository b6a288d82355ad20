//! Oracle endpoint configuration.

use serde::{Deserialize, Serialize};

/// Settings for the normalization oracle. Serialized inside the app config,
/// with every field optional so partial configs merge over defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Character budget for page text in the prompt.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    /// Override for the normalization prompt. `{url}`, `{content}`,
    /// `{links}`, and `{images}` are substituted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalize_prompt: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    std::env::var("URLHARVEST_ORACLE_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:11434".to_string())
}

fn default_model() -> String {
    std::env::var("URLHARVEST_ORACLE_MODEL").unwrap_or_else(|_| "llama3.1:8b".to_string())
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    512
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_content_chars() -> usize {
    12_000
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_content_chars: default_max_content_chars(),
            normalize_prompt: None,
        }
    }
}

impl OracleConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn get_normalize_prompt(&self) -> &str {
        self.normalize_prompt
            .as_deref()
            .unwrap_or(super::prompts::DEFAULT_NORMALIZE_PROMPT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OracleConfig::default();
        assert!(config.enabled);
        assert_eq!(config.temperature, 0.3);
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.max_content_chars, 12_000);
        assert!(config.normalize_prompt.is_none());
        assert!(config.is_default());
    }

    #[test]
    fn test_partial_json_merges_defaults() {
        let config: OracleConfig = serde_json::from_str(r#"{"model": "mistral"}"#).unwrap();
        assert_eq!(config.model, "mistral");
        assert!(config.enabled);
        assert_eq!(config.max_tokens, 512);
        assert!(!config.is_default());
    }

    #[test]
    fn test_prompt_override() {
        let mut config = OracleConfig::default();
        assert!(config.get_normalize_prompt().contains("{content}"));

        config.normalize_prompt = Some("Summarize {url}".to_string());
        assert_eq!(config.get_normalize_prompt(), "Summarize {url}");
    }
}
