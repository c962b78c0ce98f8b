use serde::{Deserialize, Serialize};

/// Generative backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub backend_type: BackendType,

    /// Model identifier.
    pub model: String,

    /// Inline API key. Prefer `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key; each type has a default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Base URL; each type has a default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub options: CompletionOptions,

    #[serde(default)]
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    #[serde(rename = "openai")]
    OpenAI,
    Mistral,
    #[serde(rename = "openrouter")]
    OpenRouter,
    Ollama,
    Anthropic,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::OpenAI => "openai",
            BackendType::Mistral => "mistral",
            BackendType::OpenRouter => "openrouter",
            BackendType::Ollama => "ollama",
            BackendType::Anthropic => "anthropic",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            BackendType::OpenAI => "https://api.openai.com/v1",
            BackendType::Mistral => "https://api.mistral.ai/v1",
            BackendType::OpenRouter => "https://openrouter.ai/api/v1",
            BackendType::Ollama => "http://localhost:11434/v1",
            BackendType::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            BackendType::OpenAI => Some("OPENAI_API_KEY"),
            BackendType::Mistral => Some("MISTRAL_API_KEY"),
            BackendType::OpenRouter => Some("OPENROUTER_API_KEY"),
            BackendType::Ollama => None,
            BackendType::Anthropic => Some("ANTHROPIC_API_KEY"),
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, BackendType::Ollama)
    }
}

/// Sampling options sent with every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Bounded exponential backoff: delay = base_delay_ms * 2^(attempt - 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

impl BackendConfig {
    fn endpoint_has_scheme(endpoint: &str) -> bool {
        endpoint.starts_with("http://") || endpoint.starts_with("https://")
    }

    pub fn endpoint_url_is_valid(endpoint: &str) -> bool {
        let endpoint = endpoint.trim();
        if !Self::endpoint_has_scheme(endpoint) {
            return false;
        }

        let Some(rest) = endpoint.split_once("://").map(|(_, rest)| rest) else {
            return false;
        };

        if rest.is_empty() || rest.chars().any(char::is_whitespace) {
            return false;
        }

        let authority = rest.split('/').next().unwrap_or_default();
        let host_port = authority.rsplit('@').next().unwrap_or(authority);
        let host = if host_port.starts_with('[') {
            let Some(end_bracket) = host_port.find(']') else {
                return false;
            };
            &host_port[1..end_bracket]
        } else {
            host_port.split(':').next().unwrap_or_default()
        };

        if host.is_empty() {
            return false;
        }

        host == "localhost" || host.contains('.') || host.parse::<std::net::IpAddr>().is_ok()
    }

    /// Configured endpoint without trailing slash, else the type's default.
    pub fn base_url(&self) -> String {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| self.backend_type.default_endpoint())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn api_key_env_name(&self) -> Option<&str> {
        self.api_key_env
            .as_deref()
            .or_else(|| self.backend_type.default_api_key_env())
    }

    /// Inline key first, then the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                self.api_key_env_name()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|k| !k.trim().is_empty())
            })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }

        if let Some(endpoint) = &self.endpoint {
            if !Self::endpoint_url_is_valid(endpoint) {
                return Err(format!("Invalid endpoint URL: {}", endpoint));
            }
        }

        if let Some(temp) = self.options.temperature {
            if !(0.0..=2.0).contains(&temp) {
                return Err(format!(
                    "Temperature must be between 0.0 and 2.0, got {}",
                    temp
                ));
            }
        }

        if self.options.max_tokens == Some(0) {
            return Err("max_tokens must be at least 1".to_string());
        }

        Ok(())
    }
}
