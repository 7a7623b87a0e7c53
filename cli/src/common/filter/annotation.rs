//! # Task-Prefix Line Filter (`common::filter::annotation`)
//!
//! File: cli/src/common/filter/annotation.rs
//!
//! ## Overview
//!
//! When `devenv` builds several projects in parallel it interleaves their
//! output on one stream and prefixes every line with the project's task
//! number, e.g. `2>main.cpp(4): error C2143: ...`. Generic compiler
//! classifiers do not understand that prefix, so `LineAnnotationFilter`
//! removes it and hands the remainder to the classifier it wraps.
//!
//! The filter is a decorator over any [`OutputClassifier`]: it strips the
//! prefix uniformly on the error path, the action path and the plain
//! fallback. Lines without a prefix are passed through unchanged.
//!
use super::{ClassifiedItem, OutputClassifier};
use regex::Regex;
use std::sync::LazyLock;

static TASK_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+>").expect("task prefix pattern is valid"));

/// Removes a leading `N>` task prefix from `line`, if present.
///
/// Only the digits and the `>` are removed; whitespace after the prefix is
/// part of the tool's message and is kept.
pub fn strip_task_prefix(line: &str) -> &str {
    match TASK_PREFIX.find(line) {
        Some(prefix) => &line[prefix.end()..],
        None => line,
    }
}

/// Decorator that strips `devenv` task prefixes before classification.
#[derive(Debug, Clone)]
pub struct LineAnnotationFilter<C> {
    inner: C,
}

impl<C: OutputClassifier> LineAnnotationFilter<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: OutputClassifier> OutputClassifier for LineAnnotationFilter<C> {
    fn error_in_line(&mut self, line: &str) -> Option<ClassifiedItem> {
        self.inner.error_in_line(strip_task_prefix(line))
    }

    fn action_in_line(&mut self, line: &str) -> Option<ClassifiedItem> {
        self.inner.action_in_line(strip_task_prefix(line))
    }

    fn classify(&mut self, line: &str) -> ClassifiedItem {
        self.inner.classify(strip_task_prefix(line))
    }
}
