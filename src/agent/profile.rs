//! Agent profile: declaration shape and validation.

use super::prompt::{resolve_prompt_path, PromptCache};
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Agent declaration inside a pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,

    /// Short role description, prepended to the system prompt.
    pub role: String,

    /// Backend name from the application config; the default backend when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Prompt file; relative paths resolve against the prompts directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_path: Option<String>,

    /// Capability provider names this agent may call.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl AgentConfig {
    /// Inline prompt wins over the prompt file. The role line always leads.
    pub fn load_system_prompt(
        &self,
        prompt_dir: &Path,
        cache: &mut PromptCache,
    ) -> Result<String, ApiError> {
        let body = match (&self.system_prompt, &self.system_prompt_path) {
            (Some(prompt), _) => prompt.clone(),
            (None, Some(path)) => {
                let resolved = resolve_prompt_path(path, prompt_dir)?;
                cache.load_prompt(&resolved)?
            }
            (None, None) => {
                return Err(ApiError::ConfigError(format!(
                    "Agent '{}' requires either system_prompt or system_prompt_path",
                    self.id
                )))
            }
        };
        Ok(format!("You are the {}.\n\n{}", self.role.trim(), body.trim()))
    }

    pub fn backend_or<'a>(&'a self, default_backend: &'a str) -> &'a str {
        self.backend.as_deref().unwrap_or(default_backend)
    }
}

/// Validate agent configuration.
pub fn validate_agent_config(agent: &AgentConfig) -> Result<(), String> {
    if agent.id.trim().is_empty() {
        return Err("Agent ID cannot be empty".to_string());
    }

    if agent.role.trim().is_empty() {
        return Err(format!("Agent '{}' has an empty role", agent.id));
    }

    if let Some(ref prompt) = agent.system_prompt {
        if prompt.trim().is_empty() {
            return Err(format!(
                "Agent '{}': system prompt cannot be empty if provided",
                agent.id
            ));
        }
    }

    if let Some(ref prompt_path) = agent.system_prompt_path {
        if prompt_path.trim().is_empty() {
            return Err(format!(
                "Agent '{}': system_prompt_path cannot be empty if provided",
                agent.id
            ));
        }
    }

    if agent.system_prompt.is_none() && agent.system_prompt_path.is_none() {
        return Err(format!(
            "Agent '{}' requires either system_prompt or system_prompt_path",
            agent.id
        ));
    }

    if let Some(backend) = &agent.backend {
        if backend.trim().is_empty() {
            return Err(format!("Agent '{}': backend name cannot be empty", agent.id));
        }
    }

    let mut seen = Vec::new();
    for capability in &agent.capabilities {
        if seen.contains(&capability) {
            return Err(format!(
                "Agent '{}' lists capability '{}' twice",
                agent.id, capability
            ));
        }
        seen.push(capability);
    }

    Ok(())
}
