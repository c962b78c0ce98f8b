//! Agents
//!
//! An agent pairs a role and system prompt with a generative backend and a
//! closed set of capability providers. Agents are built once per run and
//! never change afterwards; tasks borrow them through `Arc`.

mod profile;
mod prompt;

pub use profile::{validate_agent_config, AgentConfig};
pub use prompt::{resolve_prompt_path, PromptCache};

use crate::backend::{BackendRegistry, ContextBlock, GenerationRequest, GenerativeBackend};
use crate::capability::{CapabilityOutput, CapabilityRegistry, CapabilitySet, ProviderFailure};
use crate::error::ApiError;
use crate::pipeline::{FailurePolicy, TaskError};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A capability call with its arguments already rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
    pub capability: String,
    pub argument: String,
    pub secondary: Option<String>,
    pub dimensions: Option<(u32, u32)>,
}

/// Everything an agent needs to execute one task.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub task: String,
    pub prompt: String,
    /// Upstream outputs, tagged with their task names.
    pub context: Vec<ContextBlock>,
    pub calls: Vec<PreparedCall>,
    pub policy: FailurePolicy,
}

#[derive(Debug, Clone)]
pub struct AgentOutput {
    pub raw: String,
    /// Provider failures tolerated under [`FailurePolicy::Continue`].
    pub warnings: Vec<ProviderFailure>,
}

pub struct Agent {
    id: String,
    role: String,
    system_prompt: String,
    backend: Arc<dyn GenerativeBackend>,
    capabilities: CapabilitySet,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("backend", &self.backend.name())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        role: impl Into<String>,
        system_prompt: impl Into<String>,
        backend: Arc<dyn GenerativeBackend>,
        capabilities: CapabilitySet,
    ) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            system_prompt: system_prompt.into(),
            backend,
            capabilities,
        }
    }

    /// Build from a declaration, resolving the backend and binding capabilities.
    pub fn from_config(
        config: &AgentConfig,
        default_backend: &str,
        backends: &BackendRegistry,
        registry: &CapabilityRegistry,
        prompt_dir: &Path,
        prompts: &mut PromptCache,
    ) -> Result<Self, ApiError> {
        validate_agent_config(config).map_err(ApiError::ConfigError)?;
        let backend_name = config.backend_or(default_backend);
        let backend = backends.get(backend_name).ok_or_else(|| {
            ApiError::ConfigError(format!(
                "Agent '{}' uses backend '{}', which is not available",
                config.id, backend_name
            ))
        })?;
        let capabilities = registry.bind(&config.capabilities)?;
        let system_prompt = config.load_system_prompt(prompt_dir, prompts)?;
        Ok(Self::new(
            config.id.clone(),
            config.role.clone(),
            system_prompt,
            Arc::clone(backend),
            capabilities,
        ))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Run the task's capability calls, then generate.
    ///
    /// Provider failures go through the task's policy; backend failures always
    /// fail the task.
    pub async fn execute(&self, invocation: Invocation) -> Result<AgentOutput, TaskError> {
        let Invocation {
            task,
            prompt,
            mut context,
            calls,
            policy,
        } = invocation;
        let mut warnings = Vec::new();

        for call in calls {
            match self.call_capability(&call).await {
                Ok(output) => {
                    debug!(task = %task, agent = %self.id, capability = %call.capability, "Capability call succeeded");
                    context.push(ContextBlock::new(call.capability.clone(), output.render()));
                }
                Err(failure) => match policy {
                    FailurePolicy::Fatal => return Err(TaskError::Provider(failure)),
                    FailurePolicy::Continue => {
                        warn!(
                            task = %task,
                            agent = %self.id,
                            capability = %failure.capability,
                            kind = %failure.kind,
                            "Capability failed; continuing: {}",
                            failure.message
                        );
                        warnings.push(failure);
                    }
                },
            }
        }

        let request = GenerationRequest {
            task,
            system_prompt: self.system_prompt.clone(),
            prompt,
            context,
            capabilities: self.capabilities.descriptors(),
        };
        let raw = self
            .backend
            .generate(&request)
            .await
            .map_err(TaskError::Backend)?;

        Ok(AgentOutput { raw, warnings })
    }

    async fn call_capability(&self, call: &PreparedCall) -> Result<CapabilityOutput, ProviderFailure> {
        let provider = self.capabilities.get(&call.capability).ok_or_else(|| {
            ProviderFailure::new(
                &call.capability,
                crate::capability::FailureKind::InvalidRequest,
                format!("capability not bound to agent '{}'", self.id),
            )
        })?;
        let request = provider.kind().build_request(
            &call.argument,
            call.secondary.as_deref(),
            call.dimensions,
        )?;
        provider.invoke(request).await
    }
}
