//! Run artifacts on disk.
//!
//! Per-task outputs land under `<output>/tasks/` as tasks succeed, so a failed
//! run still leaves its upstream work behind. The candidate profile and the
//! final document are written only after the whole run succeeded.

use crate::error::ApiError;
use crate::pipeline::{PipelineOutputs, PipelineResult, RunObserver, TaskResult};
use crate::schema::{CandidateProfile, ProfileEnvelope, ProfileStore};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const PROFILE_FILE: &str = "candidate_profile.json";
pub const DOCUMENT_FILE: &str = "resume.tex";
pub const SUMMARY_FILE: &str = "run_summary.json";

/// Writes each successful task's output as it finishes.
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn task_dir(&self) -> PathBuf {
        self.output_dir.join("tasks")
    }

    fn write_task(&self, result: &TaskResult) -> Result<(), ApiError> {
        let dir = self.task_dir();
        std::fs::create_dir_all(&dir)?;
        if let Some(raw) = &result.raw_output {
            std::fs::write(dir.join(format!("{}.txt", result.task)), raw)?;
        }
        if let Some(structured) = &result.structured {
            std::fs::write(
                dir.join(format!("{}.json", result.task)),
                serde_json::to_string_pretty(structured)?,
            )?;
        }
        Ok(())
    }

    /// Final artifacts of a successful run; nothing is written otherwise.
    pub fn write_final(
        &self,
        result: &PipelineResult,
        outputs: &PipelineOutputs,
    ) -> Result<Vec<PathBuf>, ApiError> {
        if !result.is_success() {
            return Ok(Vec::new());
        }
        std::fs::create_dir_all(&self.output_dir)?;
        let mut written = Vec::new();

        if let Some(task) = &outputs.profile {
            let value = result.structured(task).cloned().ok_or_else(|| {
                ApiError::ConfigError(format!("task '{}' produced no structured profile", task))
            })?;
            let profile = CandidateProfile::from_value(value)?;
            let path = self.output_dir.join(PROFILE_FILE);
            ProfileStore::save(&path, &ProfileEnvelope::new(profile))?;
            written.push(path);
        }

        if let Some(task) = &outputs.document {
            if let Some(raw) = result.raw(task) {
                let path = self.output_dir.join(DOCUMENT_FILE);
                std::fs::write(&path, latex_body(raw))?;
                written.push(path);
            }
        }
        Ok(written)
    }

    fn write_summary(&self, result: &PipelineResult) -> Result<(), ApiError> {
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::write(
            self.output_dir.join(SUMMARY_FILE),
            serde_json::to_string_pretty(result)?,
        )?;
        Ok(())
    }
}

impl RunObserver for ArtifactWriter {
    fn task_finished(&self, result: &TaskResult) {
        if !result.is_success() {
            return;
        }
        match self.write_task(result) {
            Ok(()) => debug!(task = %result.task, "Wrote task artifact"),
            Err(e) => warn!(task = %result.task, "Failed to write task artifact: {}", e),
        }
    }

    fn run_finished(&self, result: &PipelineResult) {
        if let Err(e) = self.write_summary(result) {
            warn!("Failed to write run summary: {}", e);
        }
    }
}

/// The body of a ```latex (or ```tex) fence when the reply has one.
pub fn latex_body(raw: &str) -> &str {
    for fence in ["```latex", "```tex"] {
        if let Some(start) = raw.find(fence) {
            let body = &raw[start + fence.len()..];
            let body = body.strip_prefix('\n').unwrap_or(body);
            if let Some(end) = body.find("```") {
                return body[..end].trim_end();
            }
        }
    }
    raw.trim()
}
