//! Versioned on-disk form of a [`CandidateProfile`].

use super::CandidateProfile;
use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Version 2 layout. Version 1 files were a bare profile object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEnvelope {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub profile: CandidateProfile,
}

impl ProfileEnvelope {
    pub fn new(profile: CandidateProfile) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            generated_at: Utc::now(),
            profile,
        }
    }
}

pub struct ProfileStore;

impl ProfileStore {
    /// Write pretty JSON through a temp file so readers never see a partial profile.
    pub fn save(path: &Path, envelope: &ProfileEnvelope) -> Result<(), ApiError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(envelope)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        info!(path = %path.display(), "Saved candidate profile");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<ProfileEnvelope, ApiError> {
        if !path.is_file() {
            return Err(ApiError::MissingInput(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        Self::from_value(value, || {
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now())
        })
    }

    /// Accept the current envelope or migrate a version 1 bare profile.
    ///
    /// `v1_timestamp` supplies `generated_at` for migrated files.
    pub fn from_value(
        value: Value,
        v1_timestamp: impl FnOnce() -> DateTime<Utc>,
    ) -> Result<ProfileEnvelope, ApiError> {
        let version = value.get("schema_version").cloned();
        match version {
            Some(Value::Number(n)) if n.as_u64() == Some(CURRENT_SCHEMA_VERSION as u64) => {
                let Value::Object(mut map) = value else {
                    return Err(ApiError::SchemaMismatch {
                        found: "non-object".to_string(),
                        expected: CURRENT_SCHEMA_VERSION,
                    });
                };
                let profile_value = map.remove("profile").unwrap_or(Value::Null);
                let profile = CandidateProfile::from_value(profile_value)?;
                let generated_at = match map.remove("generated_at") {
                    Some(ts) => serde_json::from_value(ts)?,
                    None => v1_timestamp(),
                };
                Ok(ProfileEnvelope {
                    schema_version: CURRENT_SCHEMA_VERSION,
                    generated_at,
                    profile,
                })
            }
            Some(other) => Err(ApiError::SchemaMismatch {
                found: other.to_string(),
                expected: CURRENT_SCHEMA_VERSION,
            }),
            None if value.get("name").is_some() => {
                warn!("Migrating version 1 profile");
                let profile = CandidateProfile::from_value(value)?;
                Ok(ProfileEnvelope {
                    schema_version: CURRENT_SCHEMA_VERSION,
                    generated_at: v1_timestamp(),
                    profile,
                })
            }
            None => Err(ApiError::SchemaMismatch {
                found: "unversioned".to_string(),
                expected: CURRENT_SCHEMA_VERSION,
            }),
        }
    }
}
