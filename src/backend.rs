//! Generative backend binding
//!
//! Hosted language models behind one async trait. A backend turns a
//! [`GenerationRequest`] (system prompt, task prompt, tagged context and the
//! capabilities the agent holds) into raw text. Retries live here, in
//! [`RetryingBackend`], and nowhere else in the pipeline.

mod anthropic;
mod openai;
mod retry;
mod settings;

pub use anthropic::AnthropicBackend;
pub use openai::OpenAiCompatibleBackend;
pub use retry::RetryingBackend;
pub use settings::{BackendConfig, BackendType, CompletionOptions, RetryPolicy};

use crate::capability::CapabilityDescriptor;
use crate::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Backend returned empty content")]
    EmptyContent,

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<BackendError> },
}

impl BackendError {
    /// Network errors, rate limits and server errors may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Http(_) => true,
            BackendError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => BackendError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None if err.is_decode() => BackendError::InvalidResponse(err.to_string()),
            None => BackendError::Http(err.to_string()),
        }
    }
}

/// Context handed to the model, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBlock {
    /// Upstream task name, input name or capability name.
    pub source: String,
    pub content: String,
}

impl ContextBlock {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Task the request is made for; used for logging and test doubles.
    pub task: String,
    pub system_prompt: String,
    pub prompt: String,
    pub context: Vec<ContextBlock>,
    pub capabilities: Vec<CapabilityDescriptor>,
}

impl GenerationRequest {
    /// Single user message: tagged context blocks, capability list, then the task prompt.
    pub fn user_message(&self) -> String {
        let mut message = String::new();
        for block in &self.context {
            message.push_str(&format!(
                "### Context from {}\n{}\n\n",
                block.source,
                block.content.trim()
            ));
        }
        if !self.capabilities.is_empty() {
            message.push_str("### Capabilities used for this task\n");
            for descriptor in &self.capabilities {
                message.push_str(&format!("- {}: {}\n", descriptor.name, descriptor.description));
            }
            message.push('\n');
        }
        message.push_str("### Task\n");
        message.push_str(self.prompt.trim());
        message
    }
}

/// A hosted language model.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError>;
}

/// Build one backend from configuration, wrapped for retries when the policy allows any.
pub fn build_backend(
    name: &str,
    config: &BackendConfig,
) -> Result<Arc<dyn GenerativeBackend>, ApiError> {
    config
        .validate()
        .map_err(|e| ApiError::ConfigError(format!("Backend '{}': {}", name, e)))?;
    let api_key = config.resolve_api_key();
    if config.backend_type.requires_api_key() && api_key.is_none() {
        return Err(ApiError::ConfigError(format!(
            "Backend '{}' requires an API key (set api_key or the {} environment variable)",
            name,
            config.api_key_env_name().unwrap_or("API key")
        )));
    }

    let client: Arc<dyn GenerativeBackend> = match config.backend_type {
        BackendType::Anthropic => Arc::new(AnthropicBackend::new(name, config, api_key)?),
        _ => Arc::new(OpenAiCompatibleBackend::new(name, config, api_key)?),
    };
    if config.retry.max_retries == 0 {
        return Ok(client);
    }
    Ok(Arc::new(RetryingBackend::new(client, config.retry.clone())))
}

/// Backends available to a run, keyed by configured name.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn GenerativeBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build only the named backends, so unused entries need no credentials.
    pub fn from_config<S: AsRef<str>>(
        configs: &BTreeMap<String, BackendConfig>,
        names: &[S],
    ) -> Result<Self, ApiError> {
        let mut registry = Self::new();
        for name in names {
            let name = name.as_ref();
            if registry.backends.contains_key(name) {
                continue;
            }
            let config = configs.get(name).ok_or_else(|| {
                ApiError::ConfigError(format!(
                    "Unknown backend '{}' (configured: {})",
                    name,
                    configs.keys().cloned().collect::<Vec<_>>().join(", ")
                ))
            })?;
            registry.insert(name, build_backend(name, config)?);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, name: impl Into<String>, backend: Arc<dyn GenerativeBackend>) {
        self.backends.insert(name.into(), backend);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn GenerativeBackend>> {
        self.backends.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }
}
