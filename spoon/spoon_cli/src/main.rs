use clap::{Parser, Subcommand};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::process::ExitCode;

mod commands;
mod narration;

use commands::config::CheckConfigArgs;
use commands::run::RunArgs;

/// Spoon: two polite diners, one spoon, no dinner
///
/// Runs the shared-resource ownership protocol and reports whether the
/// actors made progress or livelocked.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Log level for library diagnostics (off, error, warn, info, debug, trace)
    #[clap(long, global = true, default_value = "warn", value_parser = parse_level)]
    log_level: LevelFilter,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation
    Run(RunArgs),

    /// Validate a configuration file and print it with defaults filled in
    #[clap(name = "check-config")]
    CheckConfig(CheckConfigArgs),
}

fn parse_level(value: &str) -> Result<LevelFilter, String> {
    value
        .parse()
        .map_err(|_| format!("unknown log level {:?}", value))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // A logger may already be installed when embedded; keep going without ours
    let _ = TermLogger::init(
        cli.log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::CheckConfig(args) => commands::config::execute(&args),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("Error: {:#}", error);
            ExitCode::FAILURE
        }
    }
}
