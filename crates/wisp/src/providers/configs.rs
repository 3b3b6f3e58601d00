use std::env;

use crate::errors::{ProviderError, ProviderResult};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Settings for an openai compatible chat completion endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiProviderConfig {
    /// Base url up to and including the api version, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl OpenAiProviderConfig {
    pub fn new<K: Into<String>>(api_key: K) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: None,
        }
    }

    /// Build from `OPENAI_API_KEY`, `BASE_URL`, `MODEL`, `TEMPERATURE` and `MAX_TOKENS`,
    /// after loading a `.env` file if one is present.
    pub fn from_env() -> ProviderResult<Self> {
        let _ = dotenv::dotenv();

        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            ProviderError::Configuration("OPENAI_API_KEY is not set".to_string())
        })?;
        let mut config = Self::new(api_key);

        if let Ok(base_url) = env::var("BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = env::var("MODEL") {
            config.model = model;
        }
        if let Ok(temperature) = env::var("TEMPERATURE") {
            let temperature = temperature.parse::<f32>().map_err(|e| {
                ProviderError::Configuration(format!("TEMPERATURE is not a number: {}", e))
            })?;
            config.temperature = Some(temperature);
        }
        if let Ok(max_tokens) = env::var("MAX_TOKENS") {
            let max_tokens = max_tokens.parse::<u32>().map_err(|e| {
                ProviderError::Configuration(format!("MAX_TOKENS is not a number: {}", e))
            })?;
            config.max_tokens = Some(max_tokens);
        }

        Ok(config)
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url() {
        let mut config = OpenAiProviderConfig::new("key");
        assert_eq!(
            config.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );

        config.base_url = "http://localhost:8080/v1/".to_string();
        assert_eq!(
            config.completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_defaults() {
        let config = OpenAiProviderConfig::new("key");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.temperature, Some(DEFAULT_TEMPERATURE));
        assert_eq!(config.max_tokens, None);
    }
}
