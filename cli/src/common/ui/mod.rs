//! # devbuild UI Utilities Module (`common::ui`)
//!
//! File: cli/src/common/ui/mod.rs
//!
//! ## Overview
//!
//! Terminal rendering of classified build output, shared by `devbuild build`,
//! `devbuild clean` and `devbuild filter`.
//!
//! Two formats are supported:
//! - **Human**: one line per item, diagnostics prefixed with their severity
//!   and followed by the resolved source location when one was found.
//! - **JSON lines**: one `serde_json` object per item
//!   (`{"kind":"error","text":"...","file":"...","line":12}`), for editors and CI.
//!
use crate::common::filter::{ClassifiedItem, ItemKind};
use crate::core::error::Result;
use anyhow::Context;
use std::fmt;
use std::io::{self, Write};

/// Renders one item for a terminal.
pub fn render_item(item: &ClassifiedItem) -> String {
    let mut rendered = match item.kind {
        ItemKind::Error | ItemKind::Warning => format!("{}: {}", item.kind.label(), item.text),
        ItemKind::Action => format!("> {}", item.text),
        ItemKind::Plain => format!("  {}", item.text),
    };
    if let Some(source) = &item.source {
        rendered.push_str(&format!("\n    at {}:{}", source.file.display(), source.line));
        if let Some(column) = source.column {
            rendered.push_str(&format!(":{}", column));
        }
    }
    rendered
}

/// Renders one item as a single JSON line.
pub fn render_json(item: &ClassifiedItem) -> Result<String> {
    serde_json::to_string(item).context("Failed to serialize output item")
}

/// Writes `item` as one line to `out` in the selected format.
pub fn write_item<W: Write>(out: &mut W, item: &ClassifiedItem, json: bool) -> Result<()> {
    let rendered = if json {
        render_json(item)?
    } else {
        render_item(item)
    };
    writeln!(out, "{}", rendered).context("Failed to write output item")
}

/// Whether `err` was caused by the reader of our output going away
/// (e.g. `devbuild filter big.log | head`).
pub fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
    })
}

/// Running count of diagnostics seen in one build.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
}

impl Summary {
    pub fn record(&mut self, item: &ClassifiedItem) {
        match item.kind {
            ItemKind::Error => self.errors += 1,
            ItemKind::Warning => self.warnings += 1,
            ItemKind::Action | ItemKind::Plain => {}
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s), {} warning(s)", self.errors, self.warnings)
    }
}
