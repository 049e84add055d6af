//! LLM provider implementations

mod anthropic;
pub mod mock;
mod ollama;
mod openai_compatible;

pub use anthropic::AnthropicProvider;
pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai_compatible::OpenAICompatibleProvider;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use std::str::FromStr;
use std::time::Duration;

use crate::config::{ModelPreset, ProviderConfig};
use crate::error::{LlmError, Result};
use crate::provider::LlmProvider;

/// Chapter analyses can take minutes on local hardware.
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Supported provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Ollama,
    OpenAI,
    OpenRouter,
    Anthropic,
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "openrouter" => Ok(Self::OpenRouter),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(LlmError::ConfigError(format!("Unknown provider: {}", s))),
        }
    }
}

impl ProviderKind {
    /// Get the environment variable name for this provider's API key
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            Self::Ollama => None,
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::OpenRouter => Some("OPENROUTER_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
        }
    }
}

/// Create a provider instance from a preset and optional config
pub fn get_provider(
    preset: &ModelPreset,
    provider_config: Option<&ProviderConfig>,
) -> Result<Box<dyn LlmProvider>> {
    let kind: ProviderKind = preset.provider.parse()?;
    let client = build_client(provider_config)?;
    let base_url = provider_config.and_then(|c| c.base_url.clone());

    match kind {
        ProviderKind::Ollama => {
            let host = base_url
                .or_else(|| std::env::var("OLLAMA_HOST").ok())
                .unwrap_or_else(|| ollama::DEFAULT_HOST.to_string());
            Ok(Box::new(OllamaProvider::new(&preset.model, &host, client)))
        }
        ProviderKind::OpenAI => {
            let api_key = get_api_key(provider_config, "OPENAI_API_KEY", "OpenAI")?;
            let provider = match base_url {
                Some(url) => OpenAICompatibleProvider::new(&preset.model, &url, api_key, "OpenAI", client),
                None => OpenAICompatibleProvider::openai(&preset.model, api_key, client),
            };
            Ok(Box::new(provider))
        }
        ProviderKind::OpenRouter => {
            let api_key = get_api_key(provider_config, "OPENROUTER_API_KEY", "OpenRouter")?;
            Ok(Box::new(OpenAICompatibleProvider::openrouter(
                &preset.model,
                api_key,
                client,
            )))
        }
        ProviderKind::Anthropic => {
            let api_key = get_api_key(provider_config, "ANTHROPIC_API_KEY", "Anthropic")?;
            Ok(Box::new(AnthropicProvider::new(&preset.model, api_key, client)))
        }
    }
}

fn build_client(config: Option<&ProviderConfig>) -> Result<Client> {
    let timeout = config
        .and_then(|c| c.timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
        .map_err(|e| LlmError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

/// Get API key from config or environment variable
fn get_api_key(
    config: Option<&ProviderConfig>,
    env_var: &str,
    provider_name: &str,
) -> Result<String> {
    if let Some(key) = config.and_then(|c| c.api_key.clone()) {
        return Ok(key);
    }

    std::env::var(env_var).map_err(|_| LlmError::MissingApiKey {
        provider: provider_name.to_string(),
        env_var: env_var.to_string(),
    })
}

/// Map a non-success HTTP response onto the error taxonomy.
///
/// `extract_message` pulls the provider-specific message out of the body,
/// falling back to the raw body text.
async fn error_from_response(response: Response, extract_message: fn(&str) -> Option<String>) -> LlmError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let body = response.text().await.unwrap_or_default();
    let message = extract_message(&body).unwrap_or(body);

    match status {
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited { retry_after },
        StatusCode::SERVICE_UNAVAILABLE => LlmError::ServerOverloaded { message },
        _ => LlmError::ApiError {
            message,
            status_code: Some(status.as_u16()),
        },
    }
}

fn request_failed(err: reqwest::Error) -> LlmError {
    LlmError::ApiError {
        message: format!("Request failed: {}", err),
        status_code: err.status().map(|s| s.as_u16()),
    }
}

fn parse_failed(err: reqwest::Error) -> LlmError {
    LlmError::ApiError {
        message: format!("Failed to parse response: {}", err),
        status_code: None,
    }
}
