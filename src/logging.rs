//! Logging System
//!
//! Structured logging through `tracing`. Level, format and destination come from
//! [`LoggingConfig`], overridden by `CVFORGE_LOG*` environment variables and CLI flags.

use crate::error::ApiError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};
use tracing_subscriber::{EnvFilter, Registry};

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Where log lines go. Stdout carries command output, so stderr is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum LogOutput {
    #[serde(rename = "stdout")]
    #[value(name = "stdout")]
    Stdout,
    #[default]
    #[serde(rename = "stderr")]
    #[value(name = "stderr")]
    Stderr,
    #[serde(rename = "file")]
    #[value(name = "file")]
    File,
    #[serde(rename = "file+stderr")]
    #[value(name = "file+stderr")]
    FileAndStderr,
    #[serde(rename = "both")]
    #[value(name = "both")]
    Both,
}

impl LogOutput {
    fn writes_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::FileAndStderr)
    }
}

impl FromStr for LogFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ApiError::ConfigError(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                other
            ))),
        }
    }
}

impl FromStr for LogOutput {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            "file+stderr" => Ok(LogOutput::FileAndStderr),
            "both" => Ok(LogOutput::Both),
            other => Err(ApiError::ConfigError(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', 'file', 'file+stderr', or 'both')",
                other
            ))),
        }
    }
}

impl fmt::Display for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogOutput::Stdout => "stdout",
            LogOutput::Stderr => "stderr",
            LogOutput::File => "file",
            LogOutput::FileAndStderr => "file+stderr",
            LogOutput::Both => "both",
        };
        f.write_str(s)
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,

    /// trace, debug, info, warn, error or off.
    pub level: String,

    pub format: LogFormat,

    pub output: LogOutput,

    /// Log file when the output includes a file; None uses the per-workspace default.
    pub file: Option<PathBuf>,

    /// ANSI colors for text output on a terminal stream.
    pub color: bool,

    /// Per-target levels, e.g. `"cvforge::pipeline" = "debug"`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Text,
            output: LogOutput::Stderr,
            file: None,
            color: true,
            modules: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Check the section without installing anything.
    pub fn validate(&self) -> Result<(), String> {
        if !LEVELS.contains(&self.level.as_str()) {
            return Err(format!(
                "Invalid log level: {} (expected one of {})",
                self.level,
                LEVELS.join(", ")
            ));
        }
        for (target, level) in &self.modules {
            if !LEVELS.contains(&level.as_str()) {
                return Err(format!("Invalid log level for {}: {}", target, level));
            }
        }
        Ok(())
    }

    /// Apply `CVFORGE_LOG_FORMAT`, `CVFORGE_LOG_OUTPUT` and `CVFORGE_LOG_FILE`.
    fn with_env_overrides(mut self) -> Result<Self, ApiError> {
        if let Some(format) = env_value("CVFORGE_LOG_FORMAT") {
            self.format = format.parse()?;
        }
        if let Some(output) = env_value("CVFORGE_LOG_OUTPUT") {
            self.output = output.parse()?;
        }
        if let Some(file) = env_value("CVFORGE_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        Ok(self)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Default log file: `<state dir>/cvforge/<workspace path segments>/cvforge.log`,
/// so runs in different workspaces never share a log.
pub fn default_log_file(workspace: Option<&Path>) -> Result<PathBuf, ApiError> {
    let dirs = directories::ProjectDirs::from("", "cvforge", "cvforge").ok_or_else(|| {
        ApiError::ConfigError("Could not determine a state directory for the log file".to_string())
    })?;
    // Only Linux has a state dir.
    let mut dir = dirs
        .state_dir()
        .unwrap_or_else(|| dirs.data_local_dir())
        .to_path_buf();
    if let Some(workspace) = workspace {
        let canonical = workspace.canonicalize().map_err(|e| {
            ApiError::ConfigError(format!(
                "Failed to resolve workspace {}: {}",
                workspace.display(),
                e
            ))
        })?;
        for component in canonical.components() {
            if let Component::Normal(segment) = component {
                dir.push(segment);
            }
        }
    }
    Ok(dir.join("cvforge.log"))
}

fn open_log_file(path: &Path) -> Result<Arc<std::fs::File>, ApiError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ApiError::ConfigError(format!("Failed to create log directory: {}", e))
        })?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            ApiError::ConfigError(format!("Failed to open log file {}: {}", path.display(), e))
        })?;
    Ok(Arc::new(file))
}

/// `CVFORGE_LOG` wins outright; otherwise the configured level plus module
/// directives from the config and `CVFORGE_LOG_MODULES` ("target=level,...").
fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, ApiError> {
    if let Ok(filter) = EnvFilter::try_from_env("CVFORGE_LOG") {
        return Ok(filter);
    }
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let env_modules = env_value("CVFORGE_LOG_MODULES").unwrap_or_default();
    let env_directives = env_modules
        .split(',')
        .filter_map(|spec| spec.split_once('='))
        .map(|(target, level)| (target.trim().to_string(), level.trim().to_string()));

    let mut filter = EnvFilter::new(&config.level);
    for (target, level) in config
        .modules
        .iter()
        .map(|(t, l)| (t.clone(), l.clone()))
        .chain(env_directives)
    {
        let directive = format!("{}={}", target, level).parse().map_err(|e| {
            ApiError::ConfigError(format!("Invalid log directive {}={}: {}", target, level, e))
        })?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

fn make_writer(config: &LoggingConfig, workspace: Option<&Path>) -> Result<BoxMakeWriter, ApiError> {
    let writer = match config.output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::Both => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
        LogOutput::File | LogOutput::FileAndStderr => {
            let path = match &config.file {
                Some(path) => path.clone(),
                None => default_log_file(workspace)?,
            };
            let file = open_log_file(&path)?;
            if config.output == LogOutput::FileAndStderr {
                BoxMakeWriter::new(file.and(std::io::stderr))
            } else {
                BoxMakeWriter::new(file)
            }
        }
    };
    Ok(writer)
}

/// Install the global subscriber.
///
/// Precedence, highest first: CLI flags (already folded into `config` by the
/// caller), `CVFORGE_LOG*` environment variables, configuration files, defaults.
/// A second call leaves the first subscriber in place.
pub fn init_logging(config: &LoggingConfig, workspace: Option<&Path>) -> Result<(), ApiError> {
    if !config.enabled {
        let _ = Registry::default()
            .with(EnvFilter::new("off"))
            .with(tracing_fmt::layer().with_writer(std::io::sink))
            .try_init();
        return Ok(());
    }

    config.validate().map_err(ApiError::ConfigError)?;
    let config = config.clone().with_env_overrides()?;
    let filter = env_filter(&config)?;
    let writer = make_writer(&config, workspace)?;
    let ansi = config.color && !config.output.writes_file();

    let registry = Registry::default().with(filter);
    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                tracing_fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                tracing_fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
    Ok(())
}
