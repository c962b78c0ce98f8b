//! Task declarations, lifecycle state and per-task results.

use crate::backend::BackendError;
use crate::capability::ProviderFailure;
use crate::schema::{OutputSchema, SchemaError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// What a provider failure does to the task that hit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// The task fails with the provider failure as its cause.
    Fatal,
    /// The failure is recorded as a warning and the task proceeds.
    Continue,
}

/// A capability invocation made before the task's generation step.
///
/// Arguments are templates over the run inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityCall {
    pub capability: String,
    pub argument: String,
    /// Second argument for capabilities that take one (resume text for keyword matching).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl CapabilityCall {
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some((w, h)),
            (Some(w), None) => Some((w, w)),
            (None, Some(h)) => Some((h, h)),
            (None, None) => None,
        }
    }
}

/// One unit of work. Never mutated once the graph is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Identity; unique within a pipeline.
    pub name: String,
    pub agent: String,
    /// Prompt template; `{input}` placeholders resolve from run inputs.
    pub prompt: String,
    #[serde(default)]
    pub upstream: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<OutputSchema>,
    /// Required: there is no implicit policy.
    pub provider_failure: FailurePolicy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capability_calls: Vec<CapabilityCall>,
    /// Overrides the runner's default timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a task produced no usable result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TaskError {
    #[error("backend error: {0}")]
    Backend(BackendError),

    #[error("capability failure: {0}")]
    Provider(ProviderFailure),

    #[error("invalid structured output: {0}")]
    Schema(SchemaError),

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("template error: {0}")]
    Template(String),
}

/// Outcome of one task execution. Created once; never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task: String,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ProviderFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl TaskResult {
    /// A task that was never started.
    pub fn pending(task: &str) -> Self {
        Self {
            task: task.to_string(),
            state: TaskState::Pending,
            raw_output: None,
            structured: None,
            error: None,
            warnings: Vec::new(),
            started_at: None,
            duration_ms: 0,
        }
    }

    pub fn succeeded(
        task: &str,
        raw_output: String,
        structured: Option<Value>,
        warnings: Vec<ProviderFailure>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        Self {
            task: task.to_string(),
            state: TaskState::Succeeded,
            raw_output: Some(raw_output),
            structured,
            error: None,
            warnings,
            started_at: Some(started_at),
            duration_ms,
        }
    }

    pub fn failed(
        task: &str,
        error: TaskError,
        raw_output: Option<String>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        Self {
            task: task.to_string(),
            state: TaskState::Failed,
            raw_output,
            structured: None,
            error: Some(error),
            warnings: Vec::new(),
            started_at: Some(started_at),
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == TaskState::Succeeded
    }
}
