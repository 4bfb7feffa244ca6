//! # LLM Client
//!
//! [`LlmAdvisor`] adapts the configured chat provider to the
//! [`Advisor`] trait used by the interpreter and the confirmation negotiator.

use async_trait::async_trait;

use crate::domain::config::AdvisorConfig;
use crate::domain::traits::Advisor;
use crate::infrastructure::llm::providers::{self, ProviderConfig};
use crate::infrastructure::llm::{Context, Error, Provider};

pub struct LlmAdvisor {
    provider: Provider,
    config: ProviderConfig,
    temperature: f32,
    max_tokens: u32,
}

impl LlmAdvisor {
    /// Fails when the provider is unknown or no API key is available.
    pub fn from_config(config: &AdvisorConfig) -> Result<Self, Error> {
        let provider = Provider::parse(&config.provider)
            .ok_or_else(|| Error::new(&config.provider, "Unknown provider"))?;
        let provider_config = ProviderConfig::from_advisor_config(config)?;
        Ok(Self {
            provider,
            config: provider_config,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }
}

#[async_trait]
impl Advisor for LlmAdvisor {
    async fn complete(&self, prompt: &str, system_prompt: &str) -> Result<String, String> {
        let context = Context::prompt(prompt)
            .with_system(system_prompt)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        match providers::chat(self.provider, self.config.clone(), context).await {
            Ok(response) => {
                tracing::debug!(
                    "Advisor reply from {} ({} in / {} out tokens)",
                    response.model,
                    response.usage.prompt_tokens,
                    response.usage.completion_tokens
                );
                Ok(response.content)
            }
            Err(e) => {
                tracing::warn!("Advisor request failed: {}", e);
                Err(e.to_string())
            }
        }
    }
}
