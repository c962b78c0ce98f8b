//! ConfigLoader: composes file and environment sources into an [`AppConfig`].

use super::{xdg, AppConfig, WORKSPACE_CONFIG_FILE};
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File, FileFormat};
use std::path::Path;
use tracing::debug;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence: defaults (lowest) -> global file -> workspace `cvforge.toml`
    /// -> `explicit` file -> `CVFORGE__*` environment (highest).
    pub fn load(workspace_root: &Path, explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
        let mut builder = config::Config::builder();

        if let Ok(global) = xdg::global_config_path() {
            debug!(path = %global.display(), "Global config source");
            builder = Self::add_file(builder, &global, false);
        }

        let workspace_file = workspace_root.join(WORKSPACE_CONFIG_FILE);
        builder = Self::add_file(builder, &workspace_file, false);

        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            builder = Self::add_file(builder, path, true);
        }

        let builder = Self::add_environment(builder);
        builder.build()?.try_deserialize()
    }

    fn add_file(
        builder: ConfigBuilder<DefaultState>,
        path: &Path,
        required: bool,
    ) -> ConfigBuilder<DefaultState> {
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        };
        builder.add_source(File::from(path).format(format).required(required))
    }

    /// `CVFORGE__RUNNER__MAX_CONCURRENCY=4` sets `runner.max_concurrency`.
    fn add_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
        builder.add_source(
            Environment::with_prefix("CVFORGE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
    }
}
