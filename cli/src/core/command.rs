//! # devenv Command Assembly (`core::command`)
//!
//! File: cli/src/core/command.rs
//!
//! ## Overview
//!
//! This module turns settings and a build request into the exact command
//! line `devenv` expects:
//!
//! ```text
//! devenv.exe <target.sln|target.vcxproj> </Build|/Clean> <Configuration>
//! ```
//!
//! That argument order works for both solution and project files and must not
//! change. Nothing here starts a process; the only side effect is a
//! filesystem check that the configured executable exists and is executable.
//!
//! The tool runs in the target's directory, so relative paths given on the
//! command line are made absolute against the caller's directory first
//! (`BuildTarget::resolve`, and the executable inside `CommandBuilder::build`).
//!
//! ## Architecture
//!
//! - `BuilderSettings`: the explicit settings struct (`executable_path`,
//!   `active_configuration`) the builder is constructed with.
//! - `BuildTarget`, `BuildConfiguration`, `CommandVerb`: the request.
//! - `CommandBuilder::build`: validates the executable and assembles a
//!   `CommandSpec`, or returns `DevbuildError::Config`.
//!
use crate::core::config::DEFAULT_CONFIGURATION;
use crate::core::error::DevbuildError;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The build action requested from `devenv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandVerb {
    #[default]
    Build,
    Clean,
}

impl CommandVerb {
    /// Parses a verb name, case-insensitively. Anything that is not `clean`
    /// is treated as a build.
    pub fn parse_lenient(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("clean") {
            CommandVerb::Clean
        } else {
            CommandVerb::Build
        }
    }

    /// The `devenv` switch selecting this action.
    pub fn flag(&self) -> &'static str {
        match self {
            CommandVerb::Build => "/Build",
            CommandVerb::Clean => "/Clean",
        }
    }
}

impl fmt::Display for CommandVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandVerb::Build => write!(f, "Build"),
            CommandVerb::Clean => write!(f, "Clean"),
        }
    }
}

/// The solution or project file to build, and where to run the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    path: PathBuf,
    working_directory: PathBuf,
}

impl BuildTarget {
    /// Targets `path`, running the tool from the directory that contains it.
    /// The path is used as given; see [`BuildTarget::resolve`] for paths
    /// relative to the current directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let working_directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self {
            path,
            working_directory,
        }
    }

    /// Like [`BuildTarget::new`], but a relative `path` is first made absolute
    /// against the current directory.
    pub fn resolve(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::new(std::path::absolute(path)?))
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = dir.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }
}

/// A named build configuration such as `Debug` or `Release`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfiguration(String);

impl BuildConfiguration {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for BuildConfiguration {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIGURATION)
    }
}

/// Settings `CommandBuilder` reads; normally derived from [`Config`](crate::core::config::Config).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuilderSettings {
    pub executable_path: Option<PathBuf>,
    pub active_configuration: Option<String>,
}

/// A validated, ready-to-run command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<OsString>,
    working_directory: PathBuf,
}

impl CommandSpec {
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Assembles `devenv` command lines from explicit settings.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    settings: BuilderSettings,
}

impl CommandBuilder {
    pub fn new(settings: BuilderSettings) -> Self {
        Self { settings }
    }

    /// The configuration that will be passed to the tool, `Debug` if unset.
    pub fn configuration(&self) -> BuildConfiguration {
        self.settings
            .active_configuration
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .map(BuildConfiguration::new)
            .unwrap_or_default()
    }

    /// Validates the configured executable and builds the command line
    /// `[exe, target, verb-flag, configuration]`.
    pub fn build(
        &self,
        target: &BuildTarget,
        verb: CommandVerb,
    ) -> Result<CommandSpec, DevbuildError> {
        let program = self.settings.executable_path.as_deref().ok_or_else(|| {
            warn!("Badly configured devenv executable: no path set");
            DevbuildError::Config(
                "devenv executable path is not set (use --devenv or [devenv] executable_path)."
                    .to_string(),
            )
        })?;
        // The tool is spawned from the target's directory, so a relative
        // executable path must be pinned to ours before it is checked.
        let program = std::path::absolute(program).map_err(|e| {
            warn!("Badly configured devenv executable: {}", e);
            DevbuildError::Config(format!(
                "cannot resolve devenv executable '{}': {}",
                program.display(),
                e
            ))
        })?;
        if let Err(reason) = check_executable(&program) {
            warn!("Badly configured devenv executable: {}", reason);
            return Err(DevbuildError::Config(reason));
        }

        let spec = CommandSpec {
            program,
            args: vec![
                target.path().as_os_str().to_os_string(),
                OsString::from(verb.flag()),
                OsString::from(self.configuration().name()),
            ],
            working_directory: target.working_directory().to_path_buf(),
        };
        debug!("Assembled devenv command: {}", spec);
        Ok(spec)
    }
}

/// Checks that `path` is an existing file the current user may execute.
fn check_executable(path: &Path) -> Result<(), String> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| format!("'{}' does not exist or is unreadable: {}", path.display(), e))?;
    if !metadata.is_file() {
        return Err(format!("'{}' is not a file.", path.display()));
    }
    if !is_executable(path) {
        return Err(format!("'{}' is not executable.", path.display()));
    }
    Ok(())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use nix::unistd::{access, AccessFlags};
    access(path, AccessFlags::X_OK).is_ok()
}

#[cfg(windows)]
fn is_executable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ["exe", "com", "bat", "cmd"]
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

#[cfg(not(any(unix, windows)))]
fn is_executable(_path: &Path) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    /// Creates `devenv.exe` in a temp dir, executable on Unix.
    fn fake_devenv() -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("devenv.exe");
        std::fs::write(&exe, "#!/bin/sh\nexit 0\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        (dir, exe)
    }

    fn builder(exe: Option<PathBuf>, configuration: Option<&str>) -> CommandBuilder {
        CommandBuilder::new(BuilderSettings {
            executable_path: exe,
            active_configuration: configuration.map(String::from),
        })
    }

    #[test]
    fn test_verb_flags() {
        assert_eq!(CommandVerb::Build.flag(), "/Build");
        assert_eq!(CommandVerb::Clean.flag(), "/Clean");
        assert_eq!(CommandVerb::default(), CommandVerb::Build);
    }

    #[test]
    fn test_verb_parse_is_lenient() {
        assert_eq!(CommandVerb::parse_lenient("clean"), CommandVerb::Clean);
        assert_eq!(CommandVerb::parse_lenient(" CLEAN "), CommandVerb::Clean);
        assert_eq!(CommandVerb::parse_lenient("build"), CommandVerb::Build);
        assert_eq!(CommandVerb::parse_lenient("rebuild"), CommandVerb::Build);
        assert_eq!(CommandVerb::parse_lenient(""), CommandVerb::Build);
        assert_eq!(CommandVerb::parse_lenient("deploy").flag(), "/Build");
    }

    #[test]
    fn test_clean_release_command_line() {
        let (_dir, exe) = fake_devenv();
        let spec = builder(Some(exe.clone()), Some("Release"))
            .build(&BuildTarget::new(r"C:\proj\app.sln"), CommandVerb::Clean)
            .unwrap();
        assert_eq!(spec.program(), exe.as_path());
        assert_eq!(
            spec.args(),
            &[
                OsString::from(r"C:\proj\app.sln"),
                OsString::from("/Clean"),
                OsString::from("Release"),
            ]
        );
    }

    #[test]
    fn test_resolve_makes_target_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let target = BuildTarget::resolve("sub/app.sln").unwrap();
        assert_eq!(target.path(), cwd.join("sub/app.sln"));
        assert_eq!(target.working_directory(), cwd.join("sub"));

        let absolute = BuildTarget::resolve("/src/app/app.sln").unwrap();
        assert_eq!(absolute, BuildTarget::new("/src/app/app.sln"));
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_executable_is_made_absolute() {
        // Enough `..` to climb from any test directory to `/`.
        let relative = PathBuf::from(format!("{}bin/sh", "../".repeat(64)));
        assert!(relative.is_relative());
        let spec = builder(Some(relative), None)
            .build(&BuildTarget::new("/src/app/app.sln"), CommandVerb::Build)
            .unwrap();
        assert!(spec.program().is_absolute());
        assert!(spec.program().ends_with("bin/sh"));
        assert!(spec.program().is_file());
    }

    #[test]
    fn test_configuration_defaults_to_debug() {
        let (_dir, exe) = fake_devenv();
        for configuration in [None, Some(""), Some("   ")] {
            let spec = builder(Some(exe.clone()), configuration)
                .build(&BuildTarget::new("/src/app/app.vcxproj"), CommandVerb::Build)
                .unwrap();
            assert_eq!(
                spec.args(),
                &[
                    OsString::from("/src/app/app.vcxproj"),
                    OsString::from("/Build"),
                    OsString::from("Debug"),
                ]
            );
        }
    }

    #[test]
    fn test_working_directory_is_target_parent() {
        let (_dir, exe) = fake_devenv();
        let b = builder(Some(exe), None);
        let spec = b
            .build(&BuildTarget::new("/src/app/app.sln"), CommandVerb::Build)
            .unwrap();
        assert_eq!(spec.working_directory(), Path::new("/src/app"));

        let bare = b
            .build(&BuildTarget::new("app.sln"), CommandVerb::Build)
            .unwrap();
        assert_eq!(bare.working_directory(), Path::new("."));

        let overridden = b
            .build(
                &BuildTarget::new("/src/app/app.sln").with_working_directory("/tmp/out"),
                CommandVerb::Build,
            )
            .unwrap();
        assert_eq!(overridden.working_directory(), Path::new("/tmp/out"));
    }

    #[test]
    fn test_missing_executable_path_is_config_error() {
        let err = builder(None, None)
            .build(&BuildTarget::new("app.sln"), CommandVerb::Build)
            .unwrap_err();
        assert!(matches!(err, DevbuildError::Config(_)));
    }

    #[test]
    fn test_nonexistent_executable_is_rejected() {
        let dir = tempdir().unwrap();
        let err = builder(Some(dir.path().join("nope.exe")), None)
            .build(&BuildTarget::new("app.sln"), CommandVerb::Build)
            .unwrap_err();
        assert!(matches!(err, DevbuildError::Config(ref m) if m.contains("does not exist")));
    }

    #[test]
    fn test_directory_is_rejected() {
        let dir = tempdir().unwrap();
        let err = builder(Some(dir.path().to_path_buf()), None)
            .build(&BuildTarget::new("app.sln"), CommandVerb::Build)
            .unwrap_err();
        assert!(matches!(err, DevbuildError::Config(ref m) if m.contains("not a file")));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_file_is_rejected() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, exe) = fake_devenv();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o644)).unwrap();
        let err = builder(Some(exe), None)
            .build(&BuildTarget::new("app.sln"), CommandVerb::Build)
            .unwrap_err();
        assert!(matches!(err, DevbuildError::Config(ref m) if m.contains("not executable")));
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_bit_for_other_users_is_not_enough() {
        use std::os::unix::fs::PermissionsExt;
        // Root may execute any file with an execute bit set.
        if nix::unistd::geteuid().is_root() {
            return;
        }
        let (_dir, exe) = fake_devenv();
        // Group may execute, the owning user may not.
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o654)).unwrap();
        let err = builder(Some(exe), None)
            .build(&BuildTarget::new("app.sln"), CommandVerb::Build)
            .unwrap_err();
        assert!(matches!(err, DevbuildError::Config(ref m) if m.contains("not executable")));
    }

    #[test]
    fn test_display_joins_argv() {
        let (_dir, exe) = fake_devenv();
        let spec = builder(Some(exe.clone()), Some("Release"))
            .build(&BuildTarget::new("app.sln"), CommandVerb::Build)
            .unwrap();
        assert_eq!(
            spec.to_string(),
            format!("{} app.sln /Build Release", exe.display())
        );
    }
}
