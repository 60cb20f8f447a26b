//! Configuration types for testgen core
//!
//! Core only accepts fully resolved, validated configuration.
//! All discovery, loading, and merging happens in CLI layer.

use crate::error::{ConfigError, Result};
use crate::registry::{ModelId, ProviderKind, TestFramework};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Vendor credentials and endpoints
    pub providers: ProvidersConfig,
    /// Generation defaults and limits
    pub generation: GenerationSettings,
}

impl AppConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for kind in ProviderKind::ALL {
            let settings = self.providers.get(*kind);
            if let Some(base_url) = &settings.base_url {
                let parsed = url::Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
                    field: format!("providers.{}.base_url", kind),
                    value: format!("{} ({})", base_url, e),
                })?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(ConfigError::InvalidValue {
                        field: format!("providers.{}.base_url", kind),
                        value: base_url.clone(),
                    }
                    .into());
                }
            }
        }

        let temperature = self.generation.temperature;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                field: "generation.temperature".to_string(),
                value: temperature.to_string(),
            }
            .into());
        }

        if self.generation.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "generation.request_timeout_secs".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        if self.server.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "server.host".to_string(),
                value: self.server.host.clone(),
            }
            .into());
        }

        Ok(())
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Credentials and endpoints for every vendor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderSettings,
    pub anthropic: ProviderSettings,
    pub huggingface: ProviderSettings,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::OpenAI => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::HuggingFace => &self.huggingface,
        }
    }

    pub fn get_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::OpenAI => &mut self.openai,
            ProviderKind::Anthropic => &mut self.anthropic,
            ProviderKind::HuggingFace => &mut self.huggingface,
        }
    }
}

/// Configuration for a model provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// API key for authentication
    pub api_key: Option<String>,

    /// Custom base URL for the API
    pub base_url: Option<String>,
}

impl ProviderSettings {
    /// Get the API key, checking environment variables if not set in config
    pub fn api_key(&self, kind: ProviderKind) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().map(str::trim) {
            if !key.is_empty() {
                return Ok(key.to_string());
            }
        }

        for var in kind.api_key_envs() {
            if let Ok(key) = std::env::var(var) {
                if !key.trim().is_empty() {
                    return Ok(key.trim().to_string());
                }
            }
        }

        Err(ConfigError::MissingApiKey {
            provider: kind,
            env_var: kind.api_key_env(),
        }
        .into())
    }

    /// Get the base URL for the provider, without a trailing slash
    pub fn base_url(&self, kind: ProviderKind) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(kind.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }
}

/// Generation defaults and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Model used when the request names none
    pub default_model: ModelId,
    /// Framework used when the request names none
    pub default_framework: TestFramework,
    /// Sampling temperature sent to every vendor
    pub temperature: f32,
    /// Whole-request timeout for vendor calls
    pub request_timeout_secs: u64,
    /// Connection establishment timeout for vendor calls
    pub connect_timeout_secs: u64,
    /// Follow-up calls allowed after tool invocations
    pub max_tool_round_trips: usize,
    /// Pause between streamed lines at the HTTP boundary
    pub stream_line_delay_ms: u64,
}

impl GenerationSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn stream_line_delay(&self) -> Duration {
        Duration::from_millis(self.stream_line_delay_ms)
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            default_model: ModelId::Gpt4,
            default_framework: TestFramework::Jest,
            temperature: 0.2,
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
            max_tool_round_trips: 1,
            stream_line_delay_ms: 15,
        }
    }
}
