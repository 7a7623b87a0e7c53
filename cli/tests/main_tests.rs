//! # devbuild CLI Main Integration Tests
//!
//! File: cli/tests/main_tests.rs
//!
//! ## Overview
//!
//! Verifies the top-level behavior of the `devbuild` command-line interface:
//! standard flags like `--version` and `--help`, and argument errors.
//!

mod common;
use common::*;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_version_flag() {
    let config = tempdir().unwrap();
    devbuild_cmd(&config)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_lists_commands() {
    let config = tempdir().unwrap();
    devbuild_cmd(&config)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("clean"))
        .stdout(predicate::str::contains("filter"));
}

#[test]
fn test_build_requires_target() {
    let config = tempdir().unwrap();
    devbuild_cmd(&config)
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<TARGET>"));
}

#[test]
fn test_invalid_config_file_is_reported() {
    let config = tempdir().unwrap();
    std::fs::write(
        config.path().join("devbuild.toml"),
        "[devenv]\nactive_configuration = \"\"\n",
    )
    .unwrap();
    devbuild_cmd(&config)
        .args(["build", "app.sln", "--devenv", "/bin/sh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}
