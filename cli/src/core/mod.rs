//! # devbuild Core Infrastructure
//!
//! File: cli/src/core/mod.rs
//!
//! ## Overview
//!
//! This module aggregates the core components of devbuild: settings,
//! errors, and the build-job machinery that drives the external tool.
//!
//! ## Architecture
//!
//! - `config`: Configuration loading, merging, and validation
//! - `error`: Error types and the shared `Result` alias
//! - `command`: `CommandBuilder`, which validates the tool and assembles its command line
//! - `job`: `ExternalBuildJob`, which runs one build and reports its outcome
//!
//! ## Usage
//!
//! ```rust
//! use crate::core::command::{BuildTarget, CommandBuilder, CommandVerb};
//! use crate::core::config; // For loading configuration
//! use crate::core::error::{DevbuildError, Result}; // For error handling
//! use crate::core::job::{ExternalBuildJob, JobEvent, JobResult};
//! ```
//!
pub mod command;
pub mod config;
pub mod error;
pub mod job;
