//! Error types shared across the pipeline.

use crate::backend::BackendError;
use crate::capability::ProviderFailure;
use crate::pipeline::TaskError;
use crate::schema::SchemaError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for pipeline construction and execution.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed pipeline definition, cycle, missing dependency or credential.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing input file: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Capability failure: {0}")]
    ProviderFailure(#[from] ProviderFailure),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("task '{task}' failed: {cause}")]
    TaskFailure { task: String, cause: TaskError },

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Schema mismatch: found version {found}, expected {expected}")]
    SchemaMismatch { found: String, expected: u32 },

    #[error("Pipeline run cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl ApiError {
    /// Name of the failing task, when the error came out of a task.
    pub fn failed_task(&self) -> Option<&str> {
        match self {
            ApiError::TaskFailure { task, .. } => Some(task),
            _ => None,
        }
    }
}
