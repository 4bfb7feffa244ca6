//! # LLM Providers
//!
//! OpenAI-compatible chat completions (OpenAI, Groq, GitHub Models, local
//! servers) and Anthropic messages.

mod anthropic;
mod openai;

use reqwest::Client;
use std::sync::OnceLock;

use crate::domain::config::AdvisorConfig;
use crate::infrastructure::llm::{Context, Error, Provider, Response};

/// HTTP client reused across requests
pub(crate) fn http_client() -> &'static Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            })
    })
}

/// Configuration for a provider
#[derive(Clone)]
pub struct ProviderConfig {
    /// API key
    pub api_key: String,
    /// Base URL (for non-default endpoints)
    pub base_url: Option<String>,
    /// Default model
    pub default_model: String,
    /// Timeout in seconds
    pub timeout: Option<u64>,
}

impl ProviderConfig {
    pub fn from_advisor_config(config: &AdvisorConfig) -> Result<Self, Error> {
        let api_key = if let Some(key) = &config.api_key {
            key.clone()
        } else if let Some(env_var) = &config.api_key_env {
            std::env::var(env_var).map_err(|e| {
                Error::new(
                    &config.provider,
                    format!("API key env var {} not set: {}", env_var, e),
                )
            })?
        } else {
            return Err(Error::new(
                &config.provider,
                "No API key provided - set api_key or api_key_env",
            ));
        };

        Ok(Self {
            api_key,
            base_url: config.endpoint.clone(),
            default_model: config.model.clone(),
            timeout: config.timeout,
        })
    }
}

/// Reads the provider's error body, preferring its `error.message` field.
pub(crate) async fn error_from(provider: &str, response: reqwest::Response) -> Error {
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });
    match message {
        Some(message) => Error::new(provider, format!("HTTP {}: {}", status, message)),
        None => Error::new(provider, format!("HTTP {}: {}", status, text)),
    }
}

/// Execute a chat request with the specified provider
pub async fn chat(
    provider: Provider,
    config: ProviderConfig,
    context: Context,
) -> Result<Response, Error> {
    match provider {
        Provider::OpenAI => openai::chat(config, context).await,
        Provider::Groq => {
            // Groq uses OpenAI-compatible API
            let config_with_url = ProviderConfig {
                base_url: config
                    .base_url
                    .or_else(|| Some("https://api.groq.com/openai/v1".to_string())),
                ..config
            };
            openai::chat(config_with_url, context).await
        }
        Provider::Anthropic => anthropic::chat(config, context).await,
    }
}
