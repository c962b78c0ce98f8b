//! XDG Base Directory paths.

use crate::error::ApiError;
use std::path::PathBuf;

/// `$XDG_CONFIG_HOME`, else `$HOME/.config`.
pub fn config_home() -> Result<PathBuf, ApiError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Ok(PathBuf::from(xdg_config_home));
        }
    }

    let home = std::env::var("HOME").map_err(|_| {
        ApiError::ConfigError(
            "Could not determine XDG config home directory (HOME not set)".to_string(),
        )
    })?;

    Ok(PathBuf::from(home).join(".config"))
}

/// `$XDG_CONFIG_HOME/cvforge/`
pub fn app_config_dir() -> Result<PathBuf, ApiError> {
    Ok(config_home()?.join("cvforge"))
}

/// Global config file; it need not exist.
pub fn global_config_path() -> Result<PathBuf, ApiError> {
    Ok(app_config_dir()?.join("config.toml"))
}

/// Directory searched for relative prompt files.
///
/// Returns `$XDG_CONFIG_HOME/cvforge/prompts/`, creating it if missing.
pub fn prompts_dir() -> Result<PathBuf, ApiError> {
    let prompts_dir = app_config_dir()?.join("prompts");

    if !prompts_dir.exists() {
        std::fs::create_dir_all(&prompts_dir).map_err(|e| {
            ApiError::ConfigError(format!(
                "Failed to create prompts directory {}: {}",
                prompts_dir.display(),
                e
            ))
        })?;
    }

    Ok(prompts_dir)
}
