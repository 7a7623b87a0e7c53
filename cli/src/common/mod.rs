//! # devbuild Common Utilities (`common`)
//!
//! File: cli/src/common/mod.rs
//!
//! ## Overview
//!
//! This module groups the utilities that are not specific to one command:
//! running external processes and classifying their output. Keeping them
//! under `common::` separates them from command handling (`commands::`) and
//! job orchestration (`core::`).
//!
//! - **`filter`**: Output classification: `OutputClassifier`, the generic
//!   `CompilerClassifier`, and the `LineAnnotationFilter` that strips
//!   `devenv` task prefixes.
//! - **`process`**: Spawning a child with stdout and stderr merged into one
//!   line stream.
//! - **`ui`**: Rendering classified items for terminals (human or JSON lines).
//!

/// Classification of build output lines into errors, warnings, actions and plain text.
pub mod filter;
/// Spawning external processes with merged, line-oriented output.
pub mod process;
/// Terminal rendering of classified output items.
pub mod ui;
