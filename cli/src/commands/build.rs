//! # devbuild Build and Clean Handler
//!
//! File: cli/src/commands/build.rs
//!
//! ## Overview
//!
//! This module implements the `devbuild build` and `devbuild clean`
//! subcommands. Both run `devenv` against a solution or project file and
//! stream its classified output to the terminal while it runs; they differ
//! only in the verb flag passed to the tool (`/Build` or `/Clean`).
//! `devbuild run --verb <VERB>` takes the verb as text; anything other than
//! `clean` builds.
//!
//! ## Architecture
//!
//! 1. Load the configuration (`core::config`) and apply the `--devenv` and
//!    `--configuration` overrides on top of it. The target and `--working-dir`
//!    are made absolute, since the tool runs in the target's directory.
//! 2. Create an `ExternalBuildJob` and start it with an event channel.
//!    Configuration problems surface here, before any process is started.
//! 3. Listen for Ctrl-C in a separate task and turn it into a cancellation.
//! 4. Print every `Item` event until `Finished` arrives, then map the job
//!    result to the command's result so a failed or cancelled build exits
//!    non-zero.
//!
//! ## Usage
//!
//! ```bash
//! # Build the Debug configuration of a solution
//! devbuild build path/to/app.sln --devenv "C:/VS/Common7/IDE/devenv.exe"
//!
//! # Clean the Release configuration, emitting JSON lines
//! devbuild clean app.sln -c Release --json
//!
//! # Verb chosen by a script
//! devbuild run app.sln --verb "$VERB"
//! ```
//!
use crate::{
    common::ui::{self, Summary},
    core::{
        command::{BuildTarget, CommandBuilder, CommandVerb},
        config,
        error::{DevbuildError, Result},
        job::{ExternalBuildJob, JobEvent, JobResult},
    },
};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Arguments shared by `devbuild build` and `devbuild clean`.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Solution or project file to hand to devenv.
    target: PathBuf,

    /// Path to devenv.exe. Overrides `devenv.executable_path` from the settings files.
    #[arg(long, env = "DEVBUILD_DEVENV")]
    devenv: Option<PathBuf>,

    /// Build configuration, e.g. "Release". Defaults to the configured one, then "Debug".
    #[arg(short = 'c', long)]
    configuration: Option<String>,

    /// Directory to run devenv in. Defaults to the directory containing the target.
    #[arg(long)]
    working_dir: Option<PathBuf>,

    /// Print one JSON object per output item instead of human-readable lines.
    #[arg(long)]
    json: bool,
}

/// Arguments for `devbuild run`, which takes the verb as text.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Action to perform: `clean`, or anything else to build.
    #[arg(long, default_value = "build", value_parser = parse_verb)]
    verb: CommandVerb,

    #[command(flatten)]
    build: BuildArgs,
}

fn parse_verb(name: &str) -> std::result::Result<CommandVerb, String> {
    Ok(CommandVerb::parse_lenient(name))
}

pub async fn handle_run(args: RunArgs) -> Result<()> {
    handle_build(args.build, args.verb).await
}

/// Runs one build or clean of `args.target` and reports its output.
pub async fn handle_build(args: BuildArgs, verb: CommandVerb) -> Result<()> {
    info!("Handling {} command...", verb);
    debug!("Build args: {:?}", args);

    let cfg = config::load_config().context("Failed to load devbuild configuration")?;
    let mut settings = cfg.builder_settings();
    if let Some(devenv) = args.devenv {
        settings.executable_path = Some(devenv);
    }
    if let Some(configuration) = args.configuration {
        settings.active_configuration = Some(configuration);
    }

    let mut target = BuildTarget::resolve(&args.target)
        .with_context(|| format!("Failed to resolve target path: {}", args.target.display()))?;
    if let Some(dir) = args.working_dir {
        let dir = std::path::absolute(&dir)
            .with_context(|| format!("Failed to resolve working directory: {}", dir.display()))?;
        target = target.with_working_directory(dir);
    }

    let mut job = ExternalBuildJob::new(CommandBuilder::new(settings), target, verb)
        .with_kill_timeout(cfg.kill_timeout());
    let (tx, mut events) = mpsc::unbounded_channel();
    let handle = job.start(tx)?;
    debug!("Build job state: {:?}", handle.state());

    let cancel = handle.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling build...");
            cancel.cancel();
        }
    });

    let mut summary = Summary::default();
    let mut output_open = true;
    while let Some(event) = events.recv().await {
        match event {
            JobEvent::Item(item) => {
                summary.record(&item);
                if !output_open {
                    continue;
                }
                if let Err(e) = ui::write_item(&mut std::io::stdout(), &item, args.json) {
                    if !ui::is_broken_pipe(&e) {
                        handle.cancel();
                        return Err(e);
                    }
                    // Keep the build running; only the printing stops.
                    debug!("Output closed by reader, no longer printing items");
                    output_open = false;
                }
            }
            JobEvent::Finished(result) => {
                debug!("Job reported result: {}", result);
                break;
            }
        }
    }

    let result = handle.wait().await;
    ctrl_c.abort();
    if !args.json {
        eprintln!("{} {}: {}", verb, result, summary);
    }
    job_outcome(result)
}

/// Maps a terminal job result to the command's result.
fn job_outcome(result: JobResult) -> Result<()> {
    match result {
        JobResult::Succeeded => Ok(()),
        JobResult::Cancelled => Err(DevbuildError::Cancelled.into()),
        JobResult::Failed(reason) => Err(DevbuildError::BuildFailed(reason.to_string()).into()),
    }
}
