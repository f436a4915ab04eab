use crate::{gateway::OpenAICompatibleGateway, scenario::Scenario};
use async_openai::config::OpenAIConfig;
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Supported chat-completion backends. All speak the OpenAI wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenAI,
    Gemini,
}

impl Provider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Ollama => "http://localhost:11434/v1",
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    fn requires_api_key(&self) -> bool {
        !matches!(self, Provider::Ollama)
    }
}

/// Model and prompt settings shared by every boundary.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub provider: Provider,
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub chat_model: String,
    pub prompts_path: Option<PathBuf>,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let provider_str = std::env::var("MODEL_PROVIDER").unwrap_or_else(|_| "ollama".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "ollama" => Provider::Ollama,
            "openai" => Provider::OpenAI,
            "gemini" => Provider::Gemini,
            other => {
                return Err(ConfigError::InvalidValue(
                    "MODEL_PROVIDER".to_string(),
                    format!("'{}' is not one of ollama, openai, gemini", other),
                ));
            }
        };

        let base_url = std::env::var("MODEL_BASE_URL")
            .unwrap_or_else(|_| provider.default_base_url().to_string());

        let api_key = std::env::var("MODEL_API_KEY").ok().map(SecretString::from);
        if provider.requires_api_key() && api_key.is_none() {
            return Err(ConfigError::MissingVar(format!(
                "MODEL_API_KEY must be set for '{}' provider",
                provider_str.to_lowercase()
            )));
        }

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "llama3".to_string());
        let prompts_path = std::env::var("PROMPTS_PATH").ok().map(PathBuf::from);

        Ok(Self {
            provider,
            base_url,
            api_key,
            chat_model,
            prompts_path,
        })
    }

    pub fn build_gateway(&self) -> OpenAICompatibleGateway {
        let mut openai_config = OpenAIConfig::new().with_api_base(&self.base_url);
        if let Some(key) = &self.api_key {
            openai_config = openai_config.with_api_key(key.expose_secret());
        }
        OpenAICompatibleGateway::new(openai_config, self.chat_model.clone())
    }

    /// The default scenario with any prompt overrides applied.
    pub fn load_scenario(&self) -> anyhow::Result<Scenario> {
        match &self.prompts_path {
            Some(path) => Scenario::par90().with_prompt_overrides(path),
            None => Ok(Scenario::par90()),
        }
    }
}
