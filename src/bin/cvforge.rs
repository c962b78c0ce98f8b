//! cvforge CLI binary

use anyhow::Context;
use clap::Parser;
use cvforge::logging::init_logging;
use cvforge::tooling::cli::{Cli, CliContext};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let context = CliContext::new(cli.workspace.clone(), cli.config.clone())
        .context("Error initializing workspace")?;
    init_logging(
        &cli.logging_config(&context.config().logging),
        Some(&cli.workspace),
    )?;

    let output = context.execute(&cli.command)?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
