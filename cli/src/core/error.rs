//! # devbuild Error Types
//!
//! File: cli/src/core/error.rs
//!
//! ## Overview
//!
//! This module defines the error types shared by the build-job core and the
//! command handlers. Two layers are used:
//! - `DevbuildError`: a `thiserror` enum naming the failures callers may want
//!   to tell apart (a badly configured build tool versus a failed build).
//! - `Result<T>`: an alias for `anyhow::Result<T>` used at command boundaries,
//!   where context is attached with `.context(...)`.
//!
//! The error taxonomy follows the life of a build job:
//! - Configuration errors are detected before any process is started.
//! - Process start errors come from the OS when spawning the tool.
//! - Build failures and cancellations are terminal job outcomes that the
//!   CLI reports as errors so the process exits non-zero.
//!
//! ## Examples
//!
//! ```rust
//! // Distinguish a configuration problem from a failed build.
//! match result {
//!     Err(e) if e.downcast_ref::<DevbuildError>().map_or(false, |de| matches!(de, DevbuildError::Config(_))) => {
//!         eprintln!("Fix your devenv settings first.");
//!     }
//!     other => other?,
//! }
//! ```
//!
use std::path::PathBuf;
use thiserror::Error;

/// Custom error type for the devbuild application.
#[derive(Error, Debug)]
pub enum DevbuildError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to start '{program}': {source}")]
    ProcessStart {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Build job has already been started; create a new job for another build.")]
    AlreadyStarted,

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Build cancelled.")]
    Cancelled,

    #[error("Failed to read build output: {0}")]
    Output(String),
}

/// Type alias for Result using anyhow::Error for broad compatibility.
pub type Result<T> = anyhow::Result<T>;
