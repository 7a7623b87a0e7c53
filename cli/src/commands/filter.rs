//! # devbuild Log Filter Handler
//!
//! File: cli/src/commands/filter.rs
//!
//! ## Overview
//!
//! Implements `devbuild filter`, which classifies a saved build log (or
//! standard input) with the same filter a live build uses. Useful for logs
//! captured on a CI machine or piped from another tool:
//!
//! ```bash
//! devenv app.sln /Build Debug | devbuild filter --json
//! devbuild filter build.log --fail-on-error
//! ```
//!
use crate::{
    common::{
        filter::{CompilerClassifier, LineAnnotationFilter, OutputClassifier},
        process::decode_line,
        ui::{self, Summary},
    },
    core::error::{DevbuildError, Result},
};
use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// Arguments for `devbuild filter`.
#[derive(Parser, Debug)]
pub struct FilterArgs {
    /// Log file to classify. Reads standard input when omitted.
    input: Option<PathBuf>,

    /// Directory relative diagnostic paths are resolved against.
    /// Defaults to the log file's directory, or the current directory for stdin.
    #[arg(long)]
    build_dir: Option<PathBuf>,

    /// Print one JSON object per output item instead of human-readable lines.
    #[arg(long)]
    json: bool,

    /// Exit with an error if any line was classified as an error.
    #[arg(long)]
    fail_on_error: bool,
}

pub async fn handle_filter(args: FilterArgs) -> Result<()> {
    info!("Handling filter command...");
    debug!("Filter args: {:?}", args);

    let build_dir = match (&args.build_dir, &args.input) {
        (Some(dir), _) => dir.clone(),
        (None, Some(input)) => input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf(),
        (None, None) => std::env::current_dir().context("Failed to get current directory")?,
    };
    let mut filter = LineAnnotationFilter::new(CompilerClassifier::new(build_dir));
    let mut out = std::io::stdout();

    let summary = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open build log: {}", path.display()))?;
            filter_lines(BufReader::new(file), &mut filter, &mut out, args.json).await?
        }
        None => {
            filter_lines(
                BufReader::new(tokio::io::stdin()),
                &mut filter,
                &mut out,
                args.json,
            )
            .await?
        }
    };

    if !args.json {
        eprintln!("{}", summary);
    }
    if args.fail_on_error && summary.errors > 0 {
        return Err(DevbuildError::BuildFailed(format!(
            "{} error(s) found in build log",
            summary.errors
        ))
        .into());
    }
    Ok(())
}

/// Classifies every line of `reader` and writes the items to `out`.
///
/// Stops early, without an error, once `out` is closed by its reader.
async fn filter_lines<R, C, W>(
    mut reader: R,
    filter: &mut C,
    out: &mut W,
    json: bool,
) -> Result<Summary>
where
    R: AsyncBufRead + Unpin,
    C: OutputClassifier,
    W: Write,
{
    let mut summary = Summary::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| DevbuildError::Output(e.to_string()))?;
        if read == 0 {
            break;
        }
        let item = filter.classify(&decode_line(&buf));
        summary.record(&item);
        if let Err(e) = ui::write_item(out, &item, json) {
            if ui::is_broken_pipe(&e) {
                debug!("Output closed by reader, stopping");
                break;
            }
            return Err(e);
        }
    }
    Ok(summary)
}
