//! Tooling
//!
//! Command-line surface: argument parsing, command dispatch, run artifacts and
//! setup diagnostics.

pub mod artifacts;
pub mod cli;
pub mod diagnostics;

pub use artifacts::ArtifactWriter;
pub use cli::{Cli, CliContext, Commands};
pub use diagnostics::ValidationResult;
