//! System prompt files.

use crate::error::ApiError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve a prompt file reference.
///
/// Absolute paths stand as given, `~/` expands to the home directory, `./`
/// is relative to the current directory and anything else is relative to
/// the prompts directory.
pub fn resolve_prompt_path(path: &str, prompt_dir: &Path) -> Result<PathBuf, ApiError> {
    let reference = Path::new(path);
    if reference.is_absolute() {
        return Ok(reference.to_path_buf());
    }
    if let Some(rest) = path.strip_prefix("~/") {
        let dirs = directories::BaseDirs::new().ok_or_else(|| {
            ApiError::ConfigError(format!("Cannot expand {}: no home directory", path))
        })?;
        return Ok(dirs.home_dir().join(rest));
    }
    if let Some(rest) = path.strip_prefix("./") {
        let cwd = std::env::current_dir()?;
        return Ok(cwd.join(rest));
    }
    Ok(prompt_dir.join(reference))
}

/// Prompt files read during one graph build. Agents sharing a file read it once.
#[derive(Debug, Default)]
pub struct PromptCache {
    loaded: HashMap<PathBuf, String>,
}

impl PromptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_prompt(&mut self, path: &Path) -> Result<String, ApiError> {
        if let Some(prompt) = self.loaded.get(path) {
            return Ok(prompt.clone());
        }
        if !path.is_file() {
            return Err(ApiError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let prompt = content.trim().to_string();
        if prompt.is_empty() {
            return Err(ApiError::ConfigError(format!(
                "Prompt file {} is empty",
                path.display()
            )));
        }
        debug!(path = %path.display(), chars = prompt.len(), "Loaded system prompt");
        self.loaded.insert(path.to_path_buf(), prompt.clone());
        Ok(prompt)
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}
