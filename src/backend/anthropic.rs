//! Anthropic Messages API client.

use super::{BackendConfig, BackendError, CompletionOptions, GenerationRequest, GenerativeBackend};
use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

pub struct AnthropicBackend {
    name: String,
    client: Client,
    url: String,
    model: String,
    api_key: String,
    options: CompletionOptions,
}

impl AnthropicBackend {
    pub fn new(
        name: &str,
        config: &BackendConfig,
        api_key: Option<String>,
    ) -> Result<Self, ApiError> {
        let api_key = api_key.ok_or_else(|| {
            ApiError::ConfigError(format!("Backend '{}' requires an Anthropic API key", name))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            name: name.to_string(),
            client,
            url: format!("{}/messages", config.base_url()),
            model: config.model.clone(),
            api_key,
            options: config.options.clone(),
        })
    }
}

#[async_trait]
impl GenerativeBackend for AnthropicBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        let user = request.user_message();
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: &request.system_prompt,
            messages: vec![Message {
                role: "user",
                content: &user,
            }],
            temperature: self.options.temperature,
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = response.json().await?;
        if let Some(usage) = &parsed.usage {
            debug!(
                backend = %self.name,
                task = %request.task,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Completion succeeded"
            );
        }
        let text: String = parsed
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(BackendError::EmptyContent);
        }
        Ok(text)
    }
}
