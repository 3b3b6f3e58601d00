use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use wisp::agent::DEFAULT_MAX_STEPS;
use wisp::providers::configs::OpenAiProviderConfig;

pub const CONFIG_FILE: &str = "wisp.toml";

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentSettings {
    pub max_steps: usize,
    pub tools: bool,
    pub auto_approve: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub provider: ProviderSettings,
    pub agent: AgentSettings,
}

/// Values given on the command line, which win over every other source
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_steps: Option<usize>,
    pub no_tools: bool,
    pub yes: bool,
}

impl Settings {
    /// Merge defaults, `wisp.toml` in `dir` if present, then `WISP_*` variables
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("agent.max_steps", DEFAULT_MAX_STEPS as i64)?
            .set_default("agent.tools", true)?
            .set_default("agent.auto_approve", false)?
            .add_source(File::from(dir.join(CONFIG_FILE)).required(false))
            .add_source(
                Environment::with_prefix("WISP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        tracing::debug!(?settings.agent, "loaded settings");
        Ok(settings)
    }

    pub fn apply(&mut self, overrides: CliOverrides) {
        if overrides.model.is_some() {
            self.provider.model = overrides.model;
        }
        if overrides.base_url.is_some() {
            self.provider.base_url = overrides.base_url;
        }
        if let Some(max_steps) = overrides.max_steps {
            self.agent.max_steps = max_steps;
        }
        if overrides.no_tools {
            self.agent.tools = false;
        }
        if overrides.yes {
            self.agent.auto_approve = true;
        }
    }

    /// Provider settings on top of `OPENAI_API_KEY` and friends.
    ///
    /// An api key set here skips the environment lookup entirely.
    pub fn provider_config(&self) -> anyhow::Result<OpenAiProviderConfig> {
        let mut config = match &self.provider.api_key {
            Some(api_key) => OpenAiProviderConfig::new(api_key.clone()),
            None => OpenAiProviderConfig::from_env()?,
        };
        if let Some(base_url) = &self.provider.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(model) = &self.provider.model {
            config.model = model.clone();
        }
        if self.provider.temperature.is_some() {
            config.temperature = self.provider.temperature;
        }
        if self.provider.max_tokens.is_some() {
            config.max_tokens = self.provider.max_tokens;
        }
        Ok(config)
    }
}
