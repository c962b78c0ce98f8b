//! CLI Commands
//!
//! Argument parsing and command dispatch for the `cvforge` binary. Every
//! command returns its output as a string; the binary prints it.

use super::artifacts::ArtifactWriter;
use super::diagnostics::{format_validation_result, run_checks};
use crate::backend::BackendRegistry;
use crate::capability::keywords::analyze;
use crate::capability::{CapabilityRegistry, DocumentTextProvider};
use crate::config::{xdg, AppConfig, ConfigLoader};
use crate::error::ApiError;
use crate::logging::{LogFormat, LogOutput, LoggingConfig};
use crate::pipeline::{
    PipelineDefinition, PipelineResult, PipelineRunner, RunnerConfig, TaskState,
};
use crate::schema::ProfileStore;
use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// cvforge - resume pipeline driven by LLM agents
#[derive(Parser)]
#[command(name = "cvforge")]
#[command(about = "Turn a resume, public profiles and a job posting into a validated candidate profile and an ATS resume")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (layered over global and workspace config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log output
    #[arg(long, global = true, value_enum)]
    pub log_output: Option<LogOutput>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Overlay logging flags on the configured logging section.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.format = format;
        }
        if let Some(output) = self.log_output {
            config.output = output;
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

/// Inputs of a pipeline run.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Candidate resume (PDF or text)
    #[arg(long)]
    pub resume: PathBuf,

    /// Job posting text file
    #[arg(long)]
    pub job: PathBuf,

    /// Profile photo to normalize for the layout
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// LinkedIn profile URL
    #[arg(long)]
    pub linkedin: Option<String>,

    /// GitHub username
    #[arg(long)]
    pub github: Option<String>,

    /// Output directory (default: configured output_dir)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Pipeline definition file (default: built-in resume pipeline)
    #[arg(long)]
    pub pipeline: Option<PathBuf>,

    /// Tasks of one stage that may run at once
    #[arg(long)]
    pub max_concurrency: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline and write the profile and the resume
    Run(RunArgs),

    /// Run only the extraction half and write the candidate profile
    Extract(RunArgs),

    /// Show the stages and execution order of a pipeline
    Plan {
        /// Pipeline definition file (default: built-in resume pipeline)
        #[arg(long)]
        pipeline: Option<PathBuf>,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Persisted candidate profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Analyze job posting keywords locally, optionally against a resume
    Keywords {
        /// Job posting text file
        #[arg(long)]
        job: PathBuf,

        /// Resume to match against (PDF or text)
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Number of top keywords (default: configured max_keywords)
        #[arg(long)]
        max: Option<usize>,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate configuration, backends and credentials
    Check {
        /// Pipeline definition file (default: built-in resume pipeline)
        #[arg(long)]
        pipeline: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Load a profile file, migrating older versions, and validate it
    Validate {
        path: PathBuf,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },
}

pub struct CliContext {
    workspace_root: PathBuf,
    config: AppConfig,
    cancel: CancellationToken,
}

impl CliContext {
    /// Load layered configuration for a workspace.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::load(&workspace_root, config_path.as_deref())?;
        Ok(Self::with_config(workspace_root, config))
    }

    pub fn with_config(workspace_root: PathBuf, config: AppConfig) -> Self {
        Self {
            workspace_root,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Token cancelled by Ctrl-C during a run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Run(args) => self.handle_run(args, false),
            Commands::Extract(args) => self.handle_run(args, true),
            Commands::Plan { pipeline, format } => self.handle_plan(pipeline.as_deref(), format),
            Commands::Profile { command } => match command {
                ProfileCommands::Validate { path, format } => {
                    self.handle_profile_validate(path, format)
                }
            },
            Commands::Keywords {
                job,
                resume,
                max,
                format,
            } => self.handle_keywords(job, resume.as_deref(), *max, format),
            Commands::Check { pipeline } => self.handle_check(pipeline.as_deref()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    /// Explicit file, else the configured one, else the built-in pipeline.
    fn load_definition(&self, explicit: Option<&Path>) -> Result<PipelineDefinition, ApiError> {
        match explicit.or(self.config.pipeline.as_deref()) {
            Some(path) => PipelineDefinition::load(&self.resolve(path)),
            None => PipelineDefinition::builtin(),
        }
    }

    /// Workspace `prompts/` when present, else the XDG prompts directory.
    fn prompt_dir(&self) -> Result<PathBuf, ApiError> {
        let local = self.workspace_root.join("prompts");
        if local.is_dir() {
            return Ok(local);
        }
        xdg::prompts_dir()
    }

    fn require_file(&self, path: &Path) -> Result<PathBuf, ApiError> {
        let resolved = self.resolve(path);
        if !resolved.is_file() {
            return Err(ApiError::MissingInput(resolved));
        }
        Ok(resolved)
    }

    fn run_inputs(&self, args: &RunArgs) -> Result<BTreeMap<String, String>, ApiError> {
        let resume = self.require_file(&args.resume)?;
        let job = self.require_file(&args.job)?;
        let image = args
            .image
            .as_deref()
            .map(|p| self.require_file(p))
            .transpose()?;
        let job_posting = std::fs::read_to_string(&job)?;

        // Absent optional inputs render as empty strings; the capability calls
        // that consume them then fail and are recorded as warnings.
        let mut inputs = BTreeMap::new();
        inputs.insert("resume_path".to_string(), resume.display().to_string());
        inputs.insert("job_posting".to_string(), job_posting);
        inputs.insert(
            "linkedin_url".to_string(),
            args.linkedin.clone().unwrap_or_default(),
        );
        inputs.insert(
            "github_username".to_string(),
            args.github.clone().unwrap_or_default(),
        );
        inputs.insert(
            "profile_image".to_string(),
            image.map(|p| p.display().to_string()).unwrap_or_default(),
        );
        Ok(inputs)
    }

    /// Configuration problems stop a run before any task starts.
    fn ensure_valid_config(&self) -> Result<(), ApiError> {
        self.config.validate().map_err(|errors| {
            ApiError::ConfigError(format!("Invalid configuration: {}", errors.join("; ")))
        })
    }

    fn handle_run(&self, args: &RunArgs, extract_only: bool) -> Result<String, ApiError> {
        self.ensure_valid_config()?;
        let mut definition = self.load_definition(args.pipeline.as_deref())?;
        if extract_only {
            let target = definition.outputs.profile.clone().ok_or_else(|| {
                ApiError::ConfigError(format!(
                    "Pipeline '{}' declares no profile output to extract",
                    definition.name
                ))
            })?;
            definition = definition.restricted(&[target])?;
        }
        definition.validate()?;
        let inputs = self.run_inputs(args)?;

        let backends = BackendRegistry::from_config(
            &self.config.backends,
            &definition.backend_names(&self.config.default_backend),
        )?;
        let capabilities = CapabilityRegistry::from_config(&self.config.capabilities)?;
        let graph = definition.build_graph(
            &self.config.default_backend,
            &backends,
            &capabilities,
            &self.prompt_dir()?,
        )?;

        let output_dir = self.resolve(args.output.as_deref().unwrap_or(self.config.output_dir.as_path()));
        let writer = Arc::new(ArtifactWriter::new(&output_dir));
        let mut runner_config = RunnerConfig::from(&self.config.runner);
        if let Some(n) = args.max_concurrency {
            runner_config.max_concurrency = n.max(1);
        }
        let runner = PipelineRunner::new(runner_config)
            .with_cancellation(self.cancel.clone())
            .with_observer(writer.clone());

        info!(
            pipeline = %definition.name,
            tasks = graph.plan().len(),
            output = %output_dir.display(),
            "Starting run"
        );

        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| ApiError::ConfigError(format!("Failed to start async runtime: {}", e)))?;
        let token = self.cancel.clone();
        let result = rt.block_on(async {
            let watcher = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received; finishing in-flight tasks");
                    token.cancel();
                }
            });
            let result = runner.run(&graph, &inputs).await;
            watcher.abort();
            result
        })?;

        let written = writer.write_final(&result, &definition.outputs)?;
        let summary = format_run_summary(&result, &written, writer.output_dir());
        if result.is_success() {
            Ok(summary)
        } else {
            eprintln!("{}", summary);
            result.into_result().map(|_| String::new())
        }
    }

    fn handle_plan(&self, pipeline: Option<&Path>, format: &str) -> Result<String, ApiError> {
        let definition = self.load_definition(pipeline)?;
        definition.validate()?;
        let plan = definition.plan()?;
        match format {
            "json" => {
                let stages: Vec<Vec<&str>> = plan
                    .stages()
                    .iter()
                    .map(|stage| stage.iter().map(|t| t.name.as_str()).collect())
                    .collect();
                let order: Vec<&str> = plan.order().iter().map(|t| t.name.as_str()).collect();
                let value = json!({
                    "pipeline": definition.name,
                    "inputs": definition.inputs,
                    "stages": stages,
                    "order": order,
                });
                Ok(serde_json::to_string_pretty(&value)?)
            }
            "text" => {
                let mut out = format!("{}\n\n", format!("Pipeline: {}", definition.name).bold());
                let mut table = Table::new();
                table.load_preset(UTF8_BORDERS_ONLY);
                table.set_header(vec!["Stage", "Task", "Agent", "Upstream", "On provider failure", "Schema"]);
                for (i, stage) in plan.stages().iter().enumerate() {
                    for task in stage {
                        table.add_row(vec![
                            (i + 1).to_string(),
                            task.name.clone(),
                            task.agent.clone(),
                            if task.upstream.is_empty() {
                                "-".to_string()
                            } else {
                                task.upstream.join(", ")
                            },
                            format!("{:?}", task.provider_failure).to_lowercase(),
                            task.output_schema
                                .as_ref()
                                .map(|s| s.name().to_string())
                                .unwrap_or_else(|| "-".to_string()),
                        ]);
                    }
                }
                out.push_str(&format!("{}\n", table));
                Ok(out)
            }
            other => Err(ApiError::ConfigError(format!(
                "Invalid format: {} (must be 'text' or 'json')",
                other
            ))),
        }
    }

    fn handle_profile_validate(&self, path: &Path, format: &str) -> Result<String, ApiError> {
        let envelope = ProfileStore::load(&self.resolve(path))?;
        match format {
            "json" => Ok(serde_json::to_string_pretty(&envelope)?),
            "text" => {
                let profile = &envelope.profile;
                let mut out = format!(
                    "Profile valid: {} (schema v{}, generated {})\n",
                    profile.name,
                    envelope.schema_version,
                    envelope.generated_at.to_rfc3339()
                );
                out.push_str(&format!("  Experience entries: {}\n", profile.experience.len()));
                out.push_str(&format!("  Education entries: {}\n", profile.education.len()));
                out.push_str(&format!("  Skills: {}\n", profile.all_skills().count()));
                out.push_str(&format!("  Projects: {}\n", profile.projects.len()));
                if let Some(comparison) = &profile.resume_comparison {
                    out.push_str(&format!(
                        "  Missing skills: {}\n",
                        if comparison.missing_skills.is_empty() {
                            "-".to_string()
                        } else {
                            comparison.missing_skills.join(", ")
                        }
                    ));
                }
                Ok(out)
            }
            other => Err(ApiError::ConfigError(format!(
                "Invalid format: {} (must be 'text' or 'json')",
                other
            ))),
        }
    }

    fn handle_keywords(
        &self,
        job: &Path,
        resume: Option<&Path>,
        max: Option<usize>,
        format: &str,
    ) -> Result<String, ApiError> {
        let job_text = std::fs::read_to_string(self.require_file(job)?)?;
        let resume_text = match resume {
            Some(path) => {
                let path = self.require_file(path)?;
                let provider = DocumentTextProvider::from_config(&self.config.capabilities.documents);
                Some(provider.extract(&path)?.text)
            }
            None => None,
        };
        let max = max.unwrap_or(self.config.capabilities.keywords.max_keywords);
        let report = analyze(&job_text, resume_text.as_deref(), max);
        match format {
            "json" => Ok(serde_json::to_string_pretty(&report)?),
            "text" => Ok(report.render()),
            other => Err(ApiError::ConfigError(format!(
                "Invalid format: {} (must be 'text' or 'json')",
                other
            ))),
        }
    }

    fn handle_check(&self, pipeline: Option<&Path>) -> Result<String, ApiError> {
        let definition = self.load_definition(pipeline)?;
        let result = run_checks(&self.config, &definition);
        let text = format_validation_result(&result);
        if result.is_valid() {
            Ok(text)
        } else {
            eprint!("{}", text);
            Err(ApiError::ConfigError(format!(
                "{} setup problem(s) found",
                result.errors.len()
            )))
        }
    }
}

fn format_run_summary(result: &PipelineResult, written: &[PathBuf], output_dir: &Path) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Task", "State", "Duration", "Warnings"]);
    for task in &result.results {
        let state = match task.state {
            TaskState::Succeeded => task.state.to_string().green().to_string(),
            TaskState::Failed => task.state.to_string().red().to_string(),
            TaskState::Pending => "skipped".dimmed().to_string(),
            TaskState::Running => task.state.to_string(),
        };
        table.add_row(vec![
            task.task.clone(),
            state,
            format!("{} ms", task.duration_ms),
            task.warnings.len().to_string(),
        ]);
    }

    let mut out = format!("{}\n", table);
    let warnings = result.warnings();
    if !warnings.is_empty() {
        out.push('\n');
        for (task, failure) in warnings {
            out.push_str(&format!("{} {}: {}\n", "warning:".yellow(), task, failure));
        }
    }
    out.push('\n');
    if written.is_empty() {
        out.push_str(&format!("Task artifacts: {}\n", output_dir.join("tasks").display()));
    } else {
        for path in written {
            out.push_str(&format!("Wrote {}\n", path.display()));
        }
    }
    out.push_str(&format!("Finished in {} ms\n", result.duration_ms));
    out
}
