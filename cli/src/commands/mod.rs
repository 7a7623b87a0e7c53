//! # devbuild Command Modules
//!
//! File: cli/src/commands/mod.rs
//!
//! ## Overview
//!
//! This module aggregates the top-level commands of the devbuild CLI so they
//! are reachable from the entry point (`main.rs`).
//!
//! ## Commands
//!
//! - `build`: Runs `devenv` with `/Build` or `/Clean` (`build`, `clean`, `run --verb`)
//!   and streams classified output.
//! - `filter`: Classifies a saved build log or standard input.
//!
//! Each command defines its own arguments structure and an async handler.
//!

/// Handler shared by `devbuild build`, `devbuild clean` and `devbuild run`.
pub mod build;
/// Handler for `devbuild filter`.
pub mod filter;
