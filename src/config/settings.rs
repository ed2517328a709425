//! Configuration settings for the weave service manager.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ServiceError;

/// Name of the optional settings file under the weave home directory.
const SETTINGS_FILE: &str = "config.toml";

/// Optional overrides read from `~/.weave/config.toml`.
///
/// Every field is optional; anything not set falls back to the
/// `$HOME`-derived defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SettingsOverrides {
    /// Override for the weave home directory.
    #[serde(default)]
    pub weave_home: Option<PathBuf>,
    /// Override for the daemon log directory.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Default log level when RUST_LOG is not set.
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Resolved paths and settings used by all backends.
#[derive(Debug, Clone)]
pub struct Settings {
    /// The weave home directory (default `~/.weave`).
    pub weave_home: PathBuf,
    /// Directory holding launchd stdout/stderr log files (default
    /// `~/.weave/log`).
    pub log_dir: PathBuf,
    /// The user's launchd agents directory (`~/Library/LaunchAgents`).
    pub launch_agents_dir: PathBuf,
    /// The invoking user, rendered into systemd units.
    pub user: String,
    /// Default log level when RUST_LOG is not set.
    pub log_level: String,
}

impl Settings {
    /// Load settings for the current user, applying `config.toml`
    /// overrides if the file exists.
    pub fn load() -> Result<Self, ServiceError> {
        let home = user_home()?;
        let overrides = read_overrides(&home.join(".weave").join(SETTINGS_FILE))?;
        Ok(Self::resolve(&home, overrides))
    }

    /// Build settings rooted at an explicit user home directory.
    pub fn for_home(home: &Path) -> Self {
        Self::resolve(home, SettingsOverrides::default())
    }

    fn resolve(home: &Path, overrides: SettingsOverrides) -> Self {
        let weave_home = overrides
            .weave_home
            .unwrap_or_else(|| home.join(".weave"));
        let log_dir = overrides
            .log_dir
            .unwrap_or_else(|| weave_home.join("log"));
        Self {
            weave_home,
            log_dir,
            launch_agents_dir: home.join("Library").join("LaunchAgents"),
            user: invoking_user(),
            log_level: overrides.log_level.unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Path of the launchd stdout log file for a service slug.
    pub fn stdout_log_path(&self, slug: &str) -> PathBuf {
        self.log_dir.join(format!("{}.stdout.log", slug))
    }

    /// Path of the launchd stderr log file for a service slug.
    pub fn stderr_log_path(&self, slug: &str) -> PathBuf {
        self.log_dir.join(format!("{}.stderr.log", slug))
    }

    /// Path of the installed plist for a launchd service label.
    pub fn plist_path(&self, label: &str) -> PathBuf {
        self.launch_agents_dir.join(format!("{}.plist", label))
    }
}

fn read_overrides(path: &Path) -> Result<SettingsOverrides, ServiceError> {
    if !path.exists() {
        return Ok(SettingsOverrides::default());
    }
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| ServiceError::Config {
        message: format!("Failed to parse '{}': {}", path.display(), e),
    })
}

/// The current user's home directory, from `$HOME`.
pub fn user_home() -> Result<PathBuf, ServiceError> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| ServiceError::Config {
            message: "HOME environment variable is not set".to_string(),
        })
}

/// The invoking user name, from `$USER`, falling back to root.
pub fn invoking_user() -> String {
    env::var("USER").unwrap_or_else(|_| "root".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let settings = Settings::for_home(Path::new("/home/operator"));
        assert_eq!(settings.weave_home, PathBuf::from("/home/operator/.weave"));
        assert_eq!(settings.log_dir, PathBuf::from("/home/operator/.weave/log"));
        assert_eq!(
            settings.launch_agents_dir,
            PathBuf::from("/home/operator/Library/LaunchAgents")
        );
    }

    #[test]
    fn test_log_file_paths() {
        let settings = Settings::for_home(Path::new("/home/operator"));
        assert_eq!(
            settings.stdout_log_path("initia"),
            PathBuf::from("/home/operator/.weave/log/initia.stdout.log")
        );
        assert_eq!(
            settings.stderr_log_path("initia"),
            PathBuf::from("/home/operator/.weave/log/initia.stderr.log")
        );
    }

    #[test]
    fn test_plist_path() {
        let settings = Settings::for_home(Path::new("/home/operator"));
        assert_eq!(
            settings.plist_path("com.initia.daemon"),
            PathBuf::from("/home/operator/Library/LaunchAgents/com.initia.daemon.plist")
        );
    }

    #[test]
    fn test_overrides_applied() {
        let overrides = SettingsOverrides {
            weave_home: Some(PathBuf::from("/srv/weave")),
            log_dir: None,
            log_level: Some("debug".to_string()),
        };
        let settings = Settings::resolve(Path::new("/home/operator"), overrides);
        assert_eq!(settings.weave_home, PathBuf::from("/srv/weave"));
        assert_eq!(settings.log_dir, PathBuf::from("/srv/weave/log"));
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_parse_overrides() {
        let overrides: SettingsOverrides =
            toml::from_str("log_dir = \"/var/log/weave\"\n").unwrap();
        assert_eq!(overrides.log_dir, Some(PathBuf::from("/var/log/weave")));
        assert!(overrides.weave_home.is_none());
    }
}
