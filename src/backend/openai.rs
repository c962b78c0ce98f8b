//! OpenAI-compatible chat completions (OpenAI, Mistral, OpenRouter, Ollama).

use super::{BackendConfig, BackendError, CompletionOptions, GenerationRequest, GenerativeBackend};
use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Single-attempt client; wrap in [`super::RetryingBackend`] for retries.
pub struct OpenAiCompatibleBackend {
    name: String,
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    options: CompletionOptions,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        name: &str,
        config: &BackendConfig,
        api_key: Option<String>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            name: name.to_string(),
            client,
            url: format!("{}/chat/completions", config.base_url()),
            model: config.model.clone(),
            api_key,
            options: config.options.clone(),
        })
    }
}

#[async_trait]
impl GenerativeBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        let user = request.user_message();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        };

        let mut http = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }
        let response = http.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        if let Some(usage) = &parsed.usage {
            debug!(
                backend = %self.name,
                task = %request.task,
                prompt_tokens = usage.prompt_tokens.unwrap_or(0),
                completion_tokens = usage.completion_tokens.unwrap_or(0),
                "Completion succeeded"
            );
        }
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(BackendError::EmptyContent)
    }
}
