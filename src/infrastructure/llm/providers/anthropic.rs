//! Anthropic messages API.

use serde::{Deserialize, Serialize};

use super::{error_from, http_client, ProviderConfig};
use crate::infrastructure::llm::{Context, Error, MessageRole, Response, TokenUsage};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<RequestMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: String,
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Execute a chat request using Anthropic's API
pub async fn chat(config: ProviderConfig, context: Context) -> Result<Response, Error> {
    let base_url = config
        .base_url
        .unwrap_or_else(|| "https://api.anthropic.com".to_string());
    let model = context.model.clone().unwrap_or_else(|| {
        if config.default_model.is_empty() {
            "claude-3-5-haiku-20241022".to_string()
        } else {
            config.default_model.clone()
        }
    });
    let url = format!("{}/v1/messages", base_url.trim_end_matches('/'));

    // System prompt travels outside the message list
    let system = context.system_text();
    let messages = context
        .messages
        .into_iter()
        .filter(|m| m.role != MessageRole::System)
        .map(|m| RequestMessage {
            role: "user",
            content: m.content,
        })
        .collect();

    let request = MessagesRequest {
        model,
        max_tokens: context.max_tokens.unwrap_or(1024),
        messages,
        system,
        temperature: context.temperature,
    };

    let mut request_builder = http_client()
        .post(&url)
        .header("x-api-key", &config.api_key)
        .header("anthropic-version", API_VERSION)
        .json(&request);
    if let Some(timeout_secs) = config.timeout {
        request_builder = request_builder.timeout(std::time::Duration::from_secs(timeout_secs));
    }

    let response = request_builder
        .send()
        .await
        .map_err(|e| Error::new("anthropic", format!("HTTP request failed: {}", e)))?;
    if !response.status().is_success() {
        return Err(error_from("anthropic", response).await);
    }

    let body: MessagesResponse = response
        .json()
        .await
        .map_err(|e| Error::new("anthropic", format!("Failed to parse response: {}", e)))?;

    let content: String = body
        .content
        .into_iter()
        .filter(|block| block.content_type == "text")
        .map(|block| block.text)
        .collect();

    Ok(Response {
        content,
        model: body.model,
        usage: TokenUsage {
            prompt_tokens: body.usage.input_tokens,
            completion_tokens: body.usage.output_tokens,
        },
    })
}
