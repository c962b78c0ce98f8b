//! Pre-flight checks for `cvforge check`.

use crate::config::AppConfig;
use crate::pipeline::PipelineDefinition;
use owo_colors::OwoColorize;
use std::collections::BTreeSet;

/// Outcome of a group of checks. Optional checks never make the result invalid.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub checks: Vec<(String, bool)>,
    pub errors: Vec<String>,
    /// Problems that only disable optional enrichment.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_check(&mut self, description: &str, passed: bool) {
        self.checks.push((description.to_string(), passed));
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.checks.iter().all(|(_, passed)| *passed)
    }

    pub fn total_checks(&self) -> usize {
        self.checks.len()
    }

    pub fn passed_checks(&self) -> usize {
        self.checks.iter().filter(|(_, passed)| *passed).count()
    }
}

fn env_present(name: &str) -> bool {
    std::env::var(name).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Check configuration, the pipeline definition and every credential it needs.
pub fn run_checks(config: &AppConfig, definition: &PipelineDefinition) -> ValidationResult {
    let mut result = ValidationResult::new();

    match config.validate() {
        Ok(()) => result.add_check("Configuration is valid", true),
        Err(errors) => {
            result.add_check("Configuration is valid", false);
            for e in errors {
                result.add_error(e);
            }
        }
    }

    match definition.validate() {
        Ok(()) => result.add_check(&format!("Pipeline '{}' is valid", definition.name), true),
        Err(e) => {
            result.add_check(&format!("Pipeline '{}' is valid", definition.name), false);
            result.add_error(e.to_string());
        }
    }

    for name in definition.backend_names(&config.default_backend) {
        let Some(backend) = config.backends.get(&name) else {
            result.add_check(&format!("Backend '{}' is configured", name), false);
            result.add_error(format!("Backend '{}' is used by an agent but not configured", name));
            continue;
        };
        result.add_check(&format!("Backend '{}' is configured", name), true);
        if backend.backend_type.requires_api_key() {
            let present = backend.resolve_api_key().is_some();
            result.add_check(&format!("Backend '{}' has an API key", name), present);
            if !present {
                result.add_error(format!(
                    "Backend '{}': set api_key or {}",
                    name,
                    backend.api_key_env_name().unwrap_or("the API key variable")
                ));
            }
        }
    }

    let used: BTreeSet<&str> = definition
        .agents
        .iter()
        .flat_map(|a| a.capabilities.iter().map(String::as_str))
        .collect();
    if used.contains("web_search") {
        let search = &config.capabilities.search;
        for var in [&search.api_key_env, &search.cx_env] {
            if !env_present(var) {
                result.add_warning(format!("web_search disabled: {} is not set", var));
            }
        }
    }
    if used.contains("repositories") && !env_present(&config.capabilities.github.token_env) {
        result.add_warning(format!(
            "repositories will use the unauthenticated GitHub rate limit: {} is not set",
            config.capabilities.github.token_env
        ));
    }

    result
}

pub fn format_validation_result(result: &ValidationResult) -> String {
    let mut output = String::from("Checking cvforge setup\n\n");
    for (description, passed) in &result.checks {
        if *passed {
            output.push_str(&format!(" {} {}\n", "✓".green(), description));
        } else {
            output.push_str(&format!(" {} {}\n", "✗".red(), description));
        }
    }
    if !result.errors.is_empty() {
        output.push('\n');
        for error in &result.errors {
            output.push_str(&format!(" {} {}\n", "error:".red(), error));
        }
    }
    if !result.warnings.is_empty() {
        output.push('\n');
        for warning in &result.warnings {
            output.push_str(&format!(" {} {}\n", "warning:".yellow(), warning));
        }
    }
    output.push('\n');
    if result.is_valid() {
        output.push_str(&format!(
            "Check passed: {}/{} checks\n",
            result.passed_checks(),
            result.total_checks()
        ));
    } else {
        output.push_str(&format!(
            "Check failed: {} error(s) found\n",
            result.errors.len()
        ));
    }
    output
}
