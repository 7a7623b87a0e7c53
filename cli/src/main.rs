//! # devbuild Main Entry Point
//!
//! File: cli/src/main.rs
//!
//! ## Overview
//!
//! This file serves as the main entry point for the devbuild CLI application.
//! It handles:
//! - Command-line argument parsing using Clap
//! - Setting up the logging system based on verbosity flags
//! - Routing execution to appropriate command handlers
//!
//! ## Architecture
//!
//! - Each top-level command (`build`, `clean`, `run`, `filter`) is a variant in the `Commands` enum
//! - `build`, `clean` and `run` share one handler and differ only in the `CommandVerb` passed
//! - All errors are propagated to this level for consistent handling
//!
//! ## Examples
//!
//! ```bash
//! # Get help
//! devbuild --help
//!
//! # Build with increased verbosity
//! devbuild -vv build app.sln --devenv /opt/vs/devenv.exe
//! ```
//!
//! Command processing flow:
//! 1. Parse command-line args via Clap
//! 2. Configure logging based on verbosity level
//! 3. Route to appropriate command handler
//! 4. Format and display any errors that occur
//!
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands; // Command handlers (build, filter)
mod common; // Shared utilities (filter, process, ui)
mod core; // Core infrastructure (errors, config, command, job)

use crate::core::command::CommandVerb;

/// Defines the top-level command-line arguments structure using Clap's derive macros.
#[derive(Parser, Debug)]
#[command(
    name = "devbuild",
    about = "Run devenv builds and classify their output",
    long_about = "Runs devenv.exe against a solution or project, streaming its output\n\
                  as errors, warnings, actions and plain text while the build runs.",
    propagate_version = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Enum defining all available top-level commands.
#[derive(Parser, Debug)]
enum Commands {
    /// Build a solution or project with devenv (/Build).
    #[command(alias = "b")]
    Build(commands::build::BuildArgs),
    /// Clean a solution or project with devenv (/Clean).
    Clean(commands::build::BuildArgs),
    /// Run devenv with a verb given as text (`clean`, anything else builds).
    Run(commands::build::RunArgs),
    /// Classify a saved build log or standard input.
    #[command(alias = "f")]
    Filter(commands::filter::FilterArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    let command_result = match cli.command {
        Commands::Build(args) => commands::build::handle_build(args, CommandVerb::Build).await,
        Commands::Clean(args) => commands::build::handle_build(args, CommandVerb::Clean).await,
        Commands::Run(args) => commands::build::handle_run(args).await,
        Commands::Filter(args) => commands::filter::handle_filter(args).await,
    };

    if let Err(e) = command_result {
        tracing::error!("Command execution failed: {:?}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    fn devbuild_cmd() -> Command {
        Command::cargo_bin("devbuild").expect("Failed to find devbuild binary for testing")
    }
    #[test]
    fn test_main_help_flag() {
        devbuild_cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("filter"));
    }
    #[test]
    fn test_main_version_flag() {
        devbuild_cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }
}
