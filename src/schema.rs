//! Structured output contracts
//!
//! Model output is free text. Tasks that declare an [`OutputSchema`] have their
//! raw output searched for an embedded JSON payload that satisfies the schema;
//! the normalized payload becomes the task's structured result.

pub mod candidate;
mod extract;
pub mod store;
mod validator;

pub use candidate::{
    CandidateProfile, Education, Experience, GitHubProfile, JobPosting, Project,
    ResumeComparison, Skills,
};
pub use extract::json_candidates;
pub use store::{ProfileEnvelope, ProfileStore, CURRENT_SCHEMA_VERSION};
pub use validator::validate;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Why structured output was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub struct SchemaError {
    /// Dotted path of the offending field, when one can be named.
    pub field: Option<String>,
    pub message: String,
}

impl SchemaError {
    pub fn field(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(path.into()),
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    pub fn no_payload() -> Self {
        Self::general("no structured payload found")
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "field '{}': {}", field, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Shape a task's structured output must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputSchema {
    CandidateProfile,
    /// A JSON object with the listed keys present and non-null.
    Object {
        #[serde(default)]
        required: Vec<String>,
    },
}

impl OutputSchema {
    pub fn name(&self) -> &'static str {
        match self {
            OutputSchema::CandidateProfile => "candidate_profile",
            OutputSchema::Object { .. } => "object",
        }
    }

    /// Check a parsed payload and return its normalized form.
    pub fn check(&self, value: Value) -> Result<Value, SchemaError> {
        match self {
            OutputSchema::CandidateProfile => {
                let profile = CandidateProfile::from_value(value)?;
                serde_json::to_value(&profile).map_err(|e| SchemaError::general(e.to_string()))
            }
            OutputSchema::Object { required } => {
                let Value::Object(map) = &value else {
                    return Err(SchemaError::general(format!(
                        "expected a JSON object, found {}",
                        candidate::type_name(&value)
                    )));
                };
                for key in required {
                    match map.get(key) {
                        None | Some(Value::Null) => {
                            return Err(SchemaError::field(key.clone(), "required field missing"))
                        }
                        Some(_) => {}
                    }
                }
                Ok(value)
            }
        }
    }
}
