//! Configuration
//!
//! Layered application configuration. Sources merge with precedence
//! defaults < global file < workspace file < explicit file < environment; see
//! [`ConfigLoader`].

mod loader;
pub mod xdg;

pub use loader::ConfigLoader;

use crate::backend::{BackendConfig, BackendType, CompletionOptions, RetryPolicy};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Name of the workspace-level config file.
pub const WORKSPACE_CONFIG_FILE: &str = "cvforge.toml";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub runner: RunnerSettings,
    /// Generative backends by name. Agents refer to these names.
    pub backends: BTreeMap<String, BackendConfig>,
    /// Backend used by agents that do not name one.
    pub default_backend: String,
    pub capabilities: CapabilitiesConfig,
    /// Directory that receives run artifacts.
    pub output_dir: PathBuf,
    /// Pipeline definition file; the built-in resume pipeline when unset.
    pub pipeline: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut backends = BTreeMap::new();
        backends.insert(
            "mistral".to_string(),
            BackendConfig {
                backend_type: BackendType::Mistral,
                model: "mistral-large-latest".to_string(),
                api_key: None,
                api_key_env: Some("MISTRAL_API_KEY".to_string()),
                endpoint: None,
                options: CompletionOptions {
                    temperature: Some(0.2),
                    max_tokens: None,
                },
                retry: RetryPolicy::default(),
            },
        );
        Self {
            logging: LoggingConfig::default(),
            runner: RunnerSettings::default(),
            backends,
            default_backend: "mistral".to_string(),
            capabilities: CapabilitiesConfig::default(),
            output_dir: PathBuf::from("output"),
            pipeline: None,
        }
    }
}

impl AppConfig {
    /// Check every section and report all problems at once.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.logging.validate() {
            errors.push(format!("logging: {}", e));
        }
        if self.runner.max_concurrency == 0 {
            errors.push("runner.max_concurrency must be at least 1".to_string());
        }
        if self.runner.task_timeout_secs == 0 {
            errors.push("runner.task_timeout_secs must be at least 1".to_string());
        }
        if self.backends.is_empty() {
            errors.push("at least one backend must be configured".to_string());
        } else if !self.backends.contains_key(&self.default_backend) {
            errors.push(format!(
                "default_backend '{}' is not among the configured backends",
                self.default_backend
            ));
        }
        for (name, backend) in &self.backends {
            if let Err(e) = backend.validate() {
                errors.push(format!("backends.{}: {}", name, e));
            }
        }
        let documents = &self.capabilities.documents;
        if documents.chunk_size == 0 {
            errors.push("capabilities.documents.chunk_size must be at least 1".to_string());
        } else if documents.chunk_overlap >= documents.chunk_size {
            errors.push(format!(
                "capabilities.documents.chunk_overlap ({}) must be smaller than chunk_size ({})",
                documents.chunk_overlap, documents.chunk_size
            ));
        }
        if self.capabilities.search.max_results == 0 {
            errors.push("capabilities.search.max_results must be at least 1".to_string());
        }
        if self.capabilities.github.max_repos == 0 {
            errors.push("capabilities.github.max_repos must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Runner limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Tasks of the same stage that may run at once.
    pub max_concurrency: usize,
    /// Default per-task timeout; tasks may override it.
    pub task_timeout_secs: u64,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            task_timeout_secs: 300,
        }
    }
}

/// Settings for the built-in capability providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitiesConfig {
    pub search: SearchConfig,
    pub fetch: FetchConfig,
    pub github: GithubConfig,
    pub documents: DocumentsConfig,
    pub image: ImageConfig,
    pub keywords: KeywordsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Environment variable holding the search engine id.
    pub cx_env: String,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            cx_env: "GOOGLE_CX".to_string(),
            max_results: 5,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Page text is cut to this many characters.
    pub max_chars: usize,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_chars: 20_000,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_base: String,
    /// Optional token; unauthenticated calls work with a lower rate limit.
    pub token_env: String,
    pub max_repos: usize,
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            max_repos: 10,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Where normalized images are written; beside the source when unset.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordsConfig {
    pub max_keywords: usize,
}

impl Default for KeywordsConfig {
    fn default() -> Self {
        Self { max_keywords: 30 }
    }
}
