//! # Compiler Output Classifier (`common::filter::classifier`)
//!
//! File: cli/src/common/filter/classifier.rs
//!
//! ## Overview
//!
//! `CompilerClassifier` recognizes the diagnostics and progress lines printed
//! by Visual Studio's toolchain (`cl.exe`, `link.exe`, `devenv`, MSBuild) and,
//! since mixed toolchains are common, GCC/Clang and `make`.
//!
//! Diagnostics are matched in this order:
//! 1. MSVC: `main.cpp(12,5): error C2065: 'x': undeclared identifier`
//! 2. GCC/Clang: `src/main.c:10:5: error: expected ';'`
//! 3. Tool-level, no location: `LINK : fatal error LNK1104: ...`, `Error C1083: ...`
//!
//! `note` diagnostics keep their location but are classified `Plain`.
//!
//! ## Directory tracking
//!
//! Relative file names are resolved against the innermost directory announced
//! by `make: Entering directory '...'`, falling back to the build directory the
//! classifier was created with.
//!
use super::{ClassifiedItem, ItemKind, OutputClassifier, SourceLocation};
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static MSVC_DIAGNOSTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<file>[^\s(][^(]*?)\((?P<line>\d+)(?:,(?P<col>\d+))?\)\s*:\s*(?P<kind>fatal error|error|warning|note)(?:\s+[A-Za-z]+\d+)?\s*:",
    )
    .expect("MSVC diagnostic pattern is valid")
});

static GCC_DIAGNOSTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<file>(?:[A-Za-z]:)?[^:\s][^:]*):(?P<line>\d+):(?:(?P<col>\d+):)?\s*(?P<kind>fatal error|error|warning|note):",
    )
    .expect("GCC diagnostic pattern is valid")
});

static TOOL_DIAGNOSTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:[^:]+?\s+:\s+)?(?:command line\s+)?(?P<kind>fatal error|error|warning)\s*(?:[A-Z]+\d+)?\s*:",
    )
    .expect("tool diagnostic pattern is valid")
});

static BUILD_BANNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:-+\s*(?:Build|Clean|Rebuild All|Rebuild|Deploy) started:|=+\s*(?:Build|Clean|Rebuild All|Rebuild|Deploy):.*=+\s*$|\s*Build (?:succeeded|FAILED)\.)",
    )
    .expect("build banner pattern is valid")
});

static TOOL_STEP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:Compiling|Linking|Generating Code|Creating library|Build log was saved at)\b",
    )
    .expect("tool step pattern is valid")
});

// cl.exe echoes the name of every translation unit it compiles.
static SOURCE_ECHO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[\w.+\-]+\.(?:c|cc|cpp|cxx|c\+\+|cu|ixx)\s*$")
        .expect("source echo pattern is valid")
});

static MAKE_DIRECTORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\S*make(?:\[\d+\])?: (?P<action>Entering|Leaving) directory [`'](?P<dir>[^'`]+)'\s*$",
    )
    .expect("make directory pattern is valid")
});

static WINDOWS_ABSOLUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z]:[\\/]|\\\\)").expect("windows path pattern is valid")
});

/// Generic classifier for compiler and build-driver output.
#[derive(Debug, Clone)]
pub struct CompilerClassifier {
    build_dir: PathBuf,
    directory_stack: Vec<PathBuf>,
}

impl CompilerClassifier {
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
            directory_stack: Vec::new(),
        }
    }

    /// The directory relative paths currently resolve against.
    pub fn current_dir(&self) -> &Path {
        self.directory_stack.last().unwrap_or(&self.build_dir)
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let file = file.trim();
        if WINDOWS_ABSOLUTE.is_match(file) || Path::new(file).is_absolute() {
            PathBuf::from(file)
        } else {
            self.current_dir().join(file)
        }
    }

    fn located_item(&self, line: &str, caps: &Captures<'_>) -> Option<ClassifiedItem> {
        let line_no = caps.name("line")?.as_str().parse().ok()?;
        let column = caps.name("col").and_then(|c| c.as_str().parse().ok());
        let kind = severity(caps.name("kind")?.as_str());
        Some(
            ClassifiedItem::new(kind, line).with_source(SourceLocation {
                file: self.resolve(caps.name("file")?.as_str()),
                line: line_no,
                column,
            }),
        )
    }
}

fn severity(kind: &str) -> ItemKind {
    match kind.to_ascii_lowercase().as_str() {
        "error" | "fatal error" => ItemKind::Error,
        "warning" => ItemKind::Warning,
        _ => ItemKind::Plain,
    }
}

impl OutputClassifier for CompilerClassifier {
    fn error_in_line(&mut self, line: &str) -> Option<ClassifiedItem> {
        for pattern in [&*MSVC_DIAGNOSTIC, &*GCC_DIAGNOSTIC] {
            if let Some(caps) = pattern.captures(line) {
                if let Some(item) = self.located_item(line, &caps) {
                    return Some(item);
                }
            }
        }
        let caps = TOOL_DIAGNOSTIC.captures(line)?;
        Some(ClassifiedItem::new(severity(caps.name("kind")?.as_str()), line))
    }

    fn action_in_line(&mut self, line: &str) -> Option<ClassifiedItem> {
        if let Some(caps) = MAKE_DIRECTORY.captures(line) {
            match &caps["action"] {
                "Entering" => self.directory_stack.push(PathBuf::from(&caps["dir"])),
                _ => {
                    self.directory_stack.pop();
                }
            }
            return Some(ClassifiedItem::new(ItemKind::Action, line));
        }
        if BUILD_BANNER.is_match(line) || TOOL_STEP.is_match(line) || SOURCE_ECHO.is_match(line) {
            return Some(ClassifiedItem::new(ItemKind::Action, line));
        }
        None
    }
}
