//! # devbuild Configuration System
//!
//! File: cli/src/core/config.rs
//!
//! ## Overview
//!
//! This module loads the settings that tell devbuild where the `devenv`
//! executable lives, which build configuration to pass it, and how long to
//! wait for a cancelled build to exit before killing it.
//!
//! ## Architecture
//!
//! Configuration sources (in order of precedence):
//! 1. Command-line flags (`--devenv`, `--configuration`), applied by the command handlers
//! 2. Project-specific `.devbuild.toml` in the current directory or its ancestors
//! 3. User-specific `config.toml` in the platform config directory
//! 4. Default values defined in the code
//!
//! If the `DEVBUILD_CONFIG` environment variable names a file, that file is
//! the only settings file read.
//!
//! The resulting `Config` is an explicit value handed to
//! [`CommandBuilder`](crate::core::command::CommandBuilder); nothing reads
//! settings from global state after loading.
//!
//! ## Examples
//!
//! ```toml
//! [devenv]
//! executable_path = "~/vs/Common7/IDE/devenv.exe"
//! active_configuration = "Release"
//!
//! [job]
//! kill_timeout_secs = 10
//! ```
//!
use crate::core::command::BuilderSettings;
use crate::core::error::{DevbuildError, Result};
use crate::core::job::DEFAULT_KILL_TIMEOUT;
use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use serde::Deserialize;
use std::time::Duration;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Build configuration passed to `devenv` when none is configured.
pub const DEFAULT_CONFIGURATION: &str = "Debug";

const PROJECT_CONFIG_FILENAME: &str = ".devbuild.toml";
const CONFIG_ENV_VAR: &str = "DEVBUILD_CONFIG";

/// Represents the main configuration structure, loaded from TOML files.
///
/// Every setting is optional so that merging can tell "not set" apart from
/// "set to the default value"; the accessors on `Config` apply defaults.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub devenv: DevenvConfig,
    #[serde(default)]
    pub job: JobConfig,
}

/// Settings describing the external build tool.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DevenvConfig {
    /// Path to `devenv.exe` (can use ~). Will be expanded.
    #[serde(default)]
    pub executable_path: Option<String>,
    /// Build configuration name, e.g. "Debug" or "Release".
    #[serde(default)]
    pub active_configuration: Option<String>,
}

/// Settings for running build jobs.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Seconds to wait for a cancelled build to exit before killing it outright.
    #[serde(default)]
    pub kill_timeout_secs: Option<u64>,
}

impl Config {
    /// The settings `CommandBuilder` needs, taken from this configuration.
    pub fn builder_settings(&self) -> BuilderSettings {
        BuilderSettings {
            executable_path: self.devenv.executable_path.as_ref().map(PathBuf::from),
            active_configuration: Some(self.configuration().to_string()),
        }
    }

    /// The configured build configuration, `Debug` if unset.
    pub fn configuration(&self) -> &str {
        self.devenv
            .active_configuration
            .as_deref()
            .unwrap_or(DEFAULT_CONFIGURATION)
    }

    pub fn kill_timeout(&self) -> Duration {
        self.job
            .kill_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_KILL_TIMEOUT)
    }
}

pub fn load_config() -> Result<Config> {
    let mut config = match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) => {
            let path = PathBuf::from(path);
            info!(
                "Loading configuration from {} ({})",
                path.display(),
                CONFIG_ENV_VAR
            );
            load_config_from_path(&path)?
        }
        None => {
            let user_config = load_user_config()?;
            let project_config = load_project_config()?;
            merge_configs(user_config.unwrap_or_default(), project_config)
        }
    };
    expand_config_paths(&mut config);
    validate_config(&config).context("Configuration validation failed")?;
    debug!("Final loaded configuration: {:?}", config);
    Ok(config)
}

fn load_user_config() -> Result<Option<Config>> {
    if let Some(proj_dirs) = ProjectDirs::from("com", "Devbuild", "devbuild") {
        let config_path = proj_dirs.config_dir().join("config.toml");
        if config_path.exists() {
            info!("Loading user configuration from: {}", config_path.display());
            load_config_from_path(&config_path).map(Some)
        } else {
            debug!(
                "User configuration file not found at {}",
                config_path.display()
            );
            Ok(None)
        }
    } else {
        warn!("Could not determine user config directory.");
        Ok(None)
    }
}

fn load_project_config() -> Result<Option<Config>> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    if let Some(project_config_path) = find_project_config_path(&current_dir) {
        info!(
            "Loading project configuration from: {}",
            project_config_path.display()
        );
        load_config_from_path(&project_config_path).map(Some)
    } else {
        debug!("No project configuration file (.devbuild.toml) found in current directory or ancestors.");
        Ok(None)
    }
}

/// Walks up from `start` looking for `.devbuild.toml`, stopping at the first
/// directory that contains `.git`.
fn find_project_config_path(start: &Path) -> Option<PathBuf> {
    let mut path = start;
    loop {
        let project_config = path.join(PROJECT_CONFIG_FILENAME);
        if project_config.is_file() {
            return Some(project_config);
        }
        if path.join(".git").is_dir() {
            debug!(
                "Found .git directory at {}, stopping project config search.",
                path.display()
            );
            return None;
        }
        path = path.parent()?;
    }
}

fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

/// Overlays `project` on `user`: every value the project file sets wins.
fn merge_configs(user: Config, project: Option<Config>) -> Config {
    let project = match project {
        Some(p) => p,
        None => return user,
    };
    Config {
        devenv: DevenvConfig {
            executable_path: project.devenv.executable_path.or(user.devenv.executable_path),
            active_configuration: project
                .devenv
                .active_configuration
                .or(user.devenv.active_configuration),
        },
        job: JobConfig {
            kill_timeout_secs: project.job.kill_timeout_secs.or(user.job.kill_timeout_secs),
        },
    }
}

fn expand_config_paths(config: &mut Config) {
    if let Some(path) = config.devenv.executable_path.as_mut() {
        *path = shellexpand::tilde(path.as_str()).into_owned();
        debug!("Expanded devenv executable path: {}", path);
    }
}

fn validate_config(config: &Config) -> Result<()> {
    if matches!(config.devenv.active_configuration.as_deref(), Some(c) if c.trim().is_empty()) {
        return Err(anyhow!(DevbuildError::Config(
            "active_configuration cannot be empty.".to_string()
        )));
    }
    if config.job.kill_timeout_secs == Some(0) {
        return Err(anyhow!(DevbuildError::Config(
            "kill_timeout_secs must be at least 1.".to_string()
        )));
    }
    if matches!(config.devenv.executable_path.as_deref(), Some(p) if p.trim().is_empty()) {
        return Err(anyhow!(DevbuildError::Config(
            "executable_path cannot be empty; remove the key to leave it unset.".to_string()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_deserialize_basic_toml() {
        let toml_content = r#"
            [devenv]
            executable_path = "~/vs/devenv.exe"
            active_configuration = "Release"

            [job]
            kill_timeout_secs = 12
        "#;

        let config: Config = toml::from_str(toml_content).expect("Failed to parse TOML");
        assert_eq!(
            config.devenv.executable_path.as_deref(),
            Some("~/vs/devenv.exe")
        ); // Not yet expanded
        assert_eq!(config.configuration(), "Release");
        assert_eq!(config.kill_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn test_defaults_for_missing_sections() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.configuration(), "Debug");
        assert!(config.devenv.executable_path.is_none());
        assert_eq!(config.kill_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: std::result::Result<Config, _> =
            toml::from_str("[devenv]\nexecutable = \"devenv.exe\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_project_overrides_user() {
        let user = Config {
            devenv: DevenvConfig {
                executable_path: Some("/user/devenv.exe".into()),
                active_configuration: Some("Release".into()),
            },
            job: JobConfig {
                kill_timeout_secs: Some(9),
            },
        };
        let project = Config {
            devenv: DevenvConfig {
                executable_path: Some("/project/devenv.exe".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let merged = merge_configs(user.clone(), Some(project));
        assert_eq!(
            merged.devenv.executable_path.as_deref(),
            Some("/project/devenv.exe")
        );
        // Project left these unset, so the user's values win.
        assert_eq!(merged.configuration(), "Release");
        assert_eq!(merged.kill_timeout(), Duration::from_secs(9));

        assert_eq!(merge_configs(user.clone(), None), user);
    }

    #[test]
    fn test_project_can_restore_default_values() {
        let user: Config = toml::from_str(
            "[devenv]\nactive_configuration = \"Release\"\n[job]\nkill_timeout_secs = 9\n",
        )
        .unwrap();
        let project: Config = toml::from_str(
            "[devenv]\nactive_configuration = \"Debug\"\n[job]\nkill_timeout_secs = 5\n",
        )
        .unwrap();
        let merged = merge_configs(user, Some(project));
        assert_eq!(merged.configuration(), "Debug");
        assert_eq!(merged.kill_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_path_expansion() {
        let mut config = Config {
            devenv: DevenvConfig {
                executable_path: Some("~/tools/devenv.exe".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        expand_config_paths(&mut config);
        let home_dir = dirs::home_dir().unwrap();
        assert_eq!(
            config.devenv.executable_path.unwrap(),
            home_dir.join("tools/devenv.exe").to_string_lossy()
        );
    }

    #[test]
    fn test_validate_config() {
        assert!(validate_config(&Config::default()).is_ok());

        let mut empty_name = Config::default();
        empty_name.devenv.active_configuration = Some("  ".into());
        let err = validate_config(&empty_name).unwrap_err();
        assert!(err.to_string().contains("active_configuration"));

        let mut zero_timeout = Config::default();
        zero_timeout.job.kill_timeout_secs = Some(0);
        assert!(validate_config(&zero_timeout).is_err());

        let mut empty_path = Config::default();
        empty_path.devenv.executable_path = Some(String::new());
        assert!(validate_config(&empty_path).is_err());
    }

    #[test]
    fn test_find_project_config_path() {
        let root = tempdir().unwrap();
        let nested = root.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.path().join(PROJECT_CONFIG_FILENAME), "").unwrap();

        assert_eq!(
            find_project_config_path(&nested),
            Some(root.path().join(PROJECT_CONFIG_FILENAME))
        );

        // A .git directory below the config file ends the search.
        fs::create_dir_all(root.path().join("a/.git")).unwrap();
        assert_eq!(find_project_config_path(&nested), None);
    }

    #[test]
    fn test_builder_settings_from_config() {
        let config = Config {
            devenv: DevenvConfig {
                executable_path: Some("/opt/devenv.exe".into()),
                active_configuration: Some("Release".into()),
            },
            ..Default::default()
        };
        let settings = config.builder_settings();
        assert_eq!(
            settings.executable_path,
            Some(PathBuf::from("/opt/devenv.exe"))
        );
        assert_eq!(settings.active_configuration.as_deref(), Some("Release"));
    }
}
