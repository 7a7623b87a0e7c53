//! # devbuild Output Filtering (`common::filter`)
//!
//! File: cli/src/common/filter/mod.rs
//!
//! ## Overview
//!
//! This module turns raw build-tool output lines into structured
//! [`ClassifiedItem`]s. Classification is pluggable through the
//! [`OutputClassifier`] trait, which mirrors the two questions a build view
//! asks of every line:
//! - "is this line a diagnostic?" (`error_in_line`)
//! - "is this line an action the tool is performing?" (`action_in_line`)
//!
//! ## Architecture
//!
//! - **`classifier`**: `CompilerClassifier`, the generic compiler-output
//!   classifier (MSVC, GCC/Clang and tool-level diagnostics, build banners).
//! - **`annotation`**: `LineAnnotationFilter`, a decorator that strips the
//!   `N>` task prefix `devenv` writes in parallel builds before delegating to
//!   any wrapped classifier.
//!
//! Classifiers are stateful (`&mut self`) because some output spans several
//! lines, e.g. `make: Entering directory` changes how later relative paths
//! are resolved.
//!
use serde::Serialize;
use std::path::PathBuf;

pub mod annotation;
pub mod classifier;

pub use annotation::LineAnnotationFilter;
pub use classifier::CompilerClassifier;

/// The category assigned to one line of build output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Error,
    Warning,
    Action,
    Plain,
}

impl ItemKind {
    /// Short lowercase label used when rendering items for humans.
    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::Error => "error",
            ItemKind::Warning => "warning",
            ItemKind::Action => "action",
            ItemKind::Plain => "plain",
        }
    }
}

/// A file/line reference extracted from a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// One classified line of build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedItem {
    pub kind: ItemKind,
    pub text: String,
    #[serde(flatten)]
    pub source: Option<SourceLocation>,
}

impl ClassifiedItem {
    pub fn new(kind: ItemKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            source: None,
        }
    }

    /// An unclassified line, passed through as-is.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(ItemKind::Plain, text)
    }

    pub fn with_source(mut self, source: SourceLocation) -> Self {
        self.source = Some(source);
        self
    }
}

/// Strategy that classifies build output one line at a time.
///
/// Implementors answer the two specific questions; `classify` combines them
/// (diagnostics first, then actions, otherwise a plain item). Decorators that
/// transform the line must override `classify` too, so the plain fallback
/// sees the same transformed text.
pub trait OutputClassifier: Send {
    /// Returns an item if `line` is a diagnostic (error, warning or located note).
    fn error_in_line(&mut self, line: &str) -> Option<ClassifiedItem>;

    /// Returns an `Action` item if `line` reports something the tool is doing.
    fn action_in_line(&mut self, line: &str) -> Option<ClassifiedItem>;

    fn classify(&mut self, line: &str) -> ClassifiedItem {
        if let Some(item) = self.error_in_line(line) {
            return item;
        }
        if let Some(item) = self.action_in_line(line) {
            return item;
        }
        ClassifiedItem::plain(line)
    }
}

impl<C: OutputClassifier + ?Sized> OutputClassifier for Box<C> {
    fn error_in_line(&mut self, line: &str) -> Option<ClassifiedItem> {
        (**self).error_in_line(line)
    }

    fn action_in_line(&mut self, line: &str) -> Option<ClassifiedItem> {
        (**self).action_in_line(line)
    }

    fn classify(&mut self, line: &str) -> ClassifiedItem {
        (**self).classify(line)
    }
}
