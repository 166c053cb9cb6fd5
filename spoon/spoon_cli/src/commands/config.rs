//! Configuration file commands

use anyhow::{Context, Result};
use clap::Args;
use spoon_protocol::SimulationConfig;
use std::path::PathBuf;
use std::process::ExitCode;

/// Arguments for the check-config command
#[derive(Args)]
pub struct CheckConfigArgs {
    /// Path to a TOML simulation config
    pub path: PathBuf,
}

/// Load, validate and echo a configuration file
pub fn execute(args: &CheckConfigArgs) -> Result<ExitCode> {
    let config = SimulationConfig::load(&args.path)
        .with_context(|| format!("checking {}", args.path.display()))?;

    println!("# {} is valid", args.path.display());
    print!("{}", config.to_toml_string()?);
    Ok(ExitCode::SUCCESS)
}
