//! Declarative pipeline definitions (TOML or YAML).

use super::graph::{ExecutionPlan, TaskGraph};
use super::task::TaskSpec;
use super::template;
use crate::agent::{validate_agent_config, Agent, AgentConfig, PromptCache};
use crate::backend::BackendRegistry;
use crate::capability::{CapabilityKind, CapabilityRegistry};
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

const BUILTIN_RESUME: &str = include_str!("../../pipelines/resume.toml");

/// Which task outputs become the run's final artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutputs {
    /// Task whose structured output is persisted as the candidate profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Task whose raw output is the final document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Run inputs that prompt templates may reference.
    #[serde(default)]
    pub inputs: Vec<String>,
    pub agents: Vec<AgentConfig>,
    pub tasks: Vec<TaskSpec>,
    #[serde(default)]
    pub outputs: PipelineOutputs,
}

impl PipelineDefinition {
    /// The embedded resume pipeline.
    pub fn builtin() -> Result<Self, ApiError> {
        Self::from_toml_str(BUILTIN_RESUME)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ApiError> {
        toml::from_str(source)
            .map_err(|e| ApiError::ConfigError(format!("Invalid pipeline definition: {}", e)))
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, ApiError> {
        serde_yaml::from_str(source)
            .map_err(|e| ApiError::ConfigError(format!("Invalid pipeline definition: {}", e)))
    }

    /// Load by extension: `.yaml`/`.yml` as YAML, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, ApiError> {
        if !path.exists() {
            return Err(ApiError::MissingInput(path.to_path_buf()));
        }
        let source = std::fs::read_to_string(path)?;
        let yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let definition = if yaml {
            Self::from_yaml_str(&source)
        } else {
            Self::from_toml_str(&source)
        };
        definition.map_err(|e| match e {
            ApiError::ConfigError(msg) => {
                ApiError::ConfigError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Static checks that need no backends or credentials.
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut agent_ids = BTreeSet::new();
        let known: Vec<&str> = CapabilityKind::ALL.iter().map(|k| k.as_str()).collect();
        for agent in &self.agents {
            validate_agent_config(agent).map_err(ApiError::ConfigError)?;
            if !agent_ids.insert(agent.id.as_str()) {
                return Err(ApiError::ConfigError(format!(
                    "duplicate agent id '{}'",
                    agent.id
                )));
            }
            for capability in &agent.capabilities {
                if !known.contains(&capability.as_str()) {
                    return Err(ApiError::ConfigError(format!(
                        "agent '{}' lists unknown capability '{}'",
                        agent.id, capability
                    )));
                }
            }
        }

        let plan = self.plan()?;
        let agents: HashMap<&str, &AgentConfig> =
            self.agents.iter().map(|a| (a.id.as_str(), a)).collect();
        for task in plan.tasks() {
            if task.timeout_secs == Some(0) {
                return Err(ApiError::ConfigError(format!(
                    "task '{}' has timeout_secs = 0; use at least 1",
                    task.name
                )));
            }
            let agent = agents.get(task.agent.as_str()).ok_or_else(|| {
                ApiError::ConfigError(format!(
                    "task '{}' references unknown agent '{}'",
                    task.name, task.agent
                ))
            })?;
            for call in &task.capability_calls {
                if !agent.capabilities.contains(&call.capability) {
                    return Err(ApiError::ConfigError(format!(
                        "task '{}' calls capability '{}', which agent '{}' does not hold",
                        task.name, call.capability, agent.id
                    )));
                }
            }
        }

        let undeclared = plan.missing_inputs(self.inputs.iter().map(String::as_str));
        if let Some((task, name)) = undeclared.first() {
            return Err(ApiError::ConfigError(format!(
                "task '{}' uses placeholder {{{}}}, which is not a declared input",
                task, name
            )));
        }

        for (role, target) in [
            ("profile", &self.outputs.profile),
            ("document", &self.outputs.document),
        ] {
            if let Some(target) = target {
                if plan.task(target).is_none() {
                    return Err(ApiError::ConfigError(format!(
                        "outputs.{} names unknown task '{}'",
                        role, target
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn plan(&self) -> Result<ExecutionPlan, ApiError> {
        ExecutionPlan::new(self.tasks.clone())
    }

    /// Backend names the agents resolve to, deduplicated.
    pub fn backend_names(&self, default_backend: &str) -> Vec<String> {
        let mut names = BTreeSet::new();
        for agent in &self.agents {
            names.insert(agent.backend_or(default_backend).to_string());
        }
        names.into_iter().collect()
    }

    /// Build every agent and bind the tasks to them.
    pub fn build_graph(
        &self,
        default_backend: &str,
        backends: &BackendRegistry,
        capabilities: &CapabilityRegistry,
        prompt_dir: &Path,
    ) -> Result<TaskGraph, ApiError> {
        self.validate()?;
        let mut prompts = PromptCache::new();
        let agents = self
            .agents
            .iter()
            .map(|config| {
                Agent::from_config(
                    config,
                    default_backend,
                    backends,
                    capabilities,
                    prompt_dir,
                    &mut prompts,
                )
                .map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;
        TaskGraph::build(self.tasks.clone(), agents)
    }

    /// Only `targets` and their upstream tasks, with the agents they use.
    pub fn restricted<S: AsRef<str>>(&self, targets: &[S]) -> Result<Self, ApiError> {
        let plan = self.plan()?.restrict_to(targets)?;
        let tasks: Vec<TaskSpec> = plan.tasks().to_vec();
        let used: BTreeSet<&str> = tasks.iter().map(|t| t.agent.as_str()).collect();
        let agents = self
            .agents
            .iter()
            .filter(|a| used.contains(a.id.as_str()))
            .cloned()
            .collect();
        let keep = |target: &Option<String>| {
            target
                .as_ref()
                .filter(|name| tasks.iter().any(|t| &t.name == *name))
                .cloned()
        };
        let outputs = PipelineOutputs {
            profile: keep(&self.outputs.profile),
            document: keep(&self.outputs.document),
        };
        let inputs = self
            .inputs
            .iter()
            .filter(|input| {
                tasks.iter().any(|t| {
                    template::placeholders(&t.prompt).contains(&input.as_str())
                        || t.capability_calls.iter().any(|c| {
                            template::placeholders(&c.argument).contains(&input.as_str())
                                || c.secondary.as_deref().is_some_and(|s| {
                                    template::placeholders(s).contains(&input.as_str())
                                })
                        })
                })
            })
            .cloned()
            .collect();
        Ok(Self {
            name: self.name.clone(),
            description: self.description.clone(),
            inputs,
            agents,
            tasks,
            outputs,
        })
    }
}
