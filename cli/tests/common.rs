//! # devbuild CLI Integration Test Common Helpers
//!
//! File: cli/tests/common.rs
//!
//! ## Overview
//!
//! Shared helpers for the integration tests in `cli/tests/`. Each test file
//! is compiled as its own crate and pulls this module in with `mod common;`.
//!
//! The build tests stand in for `devenv.exe` with `/bin/sh`: the "solution"
//! file is a shell script, so `sh app.sln /Build Debug` runs it with the verb
//! flag as `$1` and the configuration as `$2`.
//!

// Different test files use different helpers.
#![allow(dead_code)]

pub use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Returns a `Command` for the compiled `devbuild` binary, isolated from any
/// user or project settings file.
pub fn devbuild_cmd(config_dir: &TempDir) -> Command {
    let config = config_dir.path().join("devbuild.toml");
    if !config.exists() {
        std::fs::write(&config, "").expect("Failed to write empty test config");
    }
    let mut cmd = Command::cargo_bin("devbuild").expect("Failed to find devbuild binary for testing");
    cmd.env("DEVBUILD_CONFIG", &config)
        .env_remove("DEVBUILD_DEVENV")
        .env_remove("RUST_LOG");
    cmd
}

/// Writes `body` as a shell script named `app.sln` inside `dir`.
pub fn script_target(dir: &Path, body: &str) -> PathBuf {
    let target = dir.join("app.sln");
    std::fs::write(&target, format!("#!/bin/sh\n{}\n", body))
        .expect("Failed to write test build script");
    target
}
