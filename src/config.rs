//! Application paths and startup options
//!
//! Everything here is resolved once at startup from the platform directories
//! and a handful of environment variables.

use crate::persistence::{settings_file::SETTINGS_FILE, PersistencePaths};
use std::path::PathBuf;
use tracing::Level;

const APP_DIR: &str = "recoil-control";
const PRESETS_DIR: &str = "presets";

pub const DIR_ENV: &str = "RECOIL_CONTROL_DIR";
pub const START_ENABLED_ENV: &str = "RECOIL_CONTROL_START_ENABLED";
pub const LOG_ENV: &str = "RECOIL_CONTROL_LOG";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config_dir: PathBuf,
    /// Correction enabled right after launch
    pub start_enabled: bool,
    pub log_level: Level,
    /// Problems found while resolving, logged once logging is up
    pub notices: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir().unwrap_or_else(|| PathBuf::from(".")),
            start_enabled: false,
            log_level: Level::INFO,
            notices: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var(DIR_ENV).ok(),
            std::env::var(START_ENABLED_ENV).ok(),
            std::env::var(LOG_ENV).ok(),
        )
    }

    fn resolve(dir: Option<String>, start_enabled: Option<String>, log: Option<String>) -> Self {
        let mut config = AppConfig::default();

        match dir.filter(|d| !d.trim().is_empty()) {
            Some(dir) => config.config_dir = PathBuf::from(dir),
            None if default_config_dir().is_none() => config
                .notices
                .push("Could not determine home directory, using current directory".to_string()),
            None => {}
        }

        if let Some(value) = start_enabled {
            match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.start_enabled = true,
                "0" | "false" | "no" | "off" | "" => config.start_enabled = false,
                other => config
                    .notices
                    .push(format!("Ignoring {}={}, expected a boolean", START_ENABLED_ENV, other)),
            }
        }

        if let Some(value) = log {
            match value.parse::<Level>() {
                Ok(level) => config.log_level = level,
                Err(_) => config
                    .notices
                    .push(format!("Ignoring {}={}, expected a log level", LOG_ENV, value)),
            }
        }

        config
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    pub fn presets_dir(&self) -> PathBuf {
        self.config_dir.join(PRESETS_DIR)
    }

    pub fn persistence_paths(&self) -> PersistencePaths {
        PersistencePaths {
            settings_file: self.settings_file(),
            presets_dir: self.presets_dir(),
        }
    }
}

fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .or_else(|| dirs::home_dir().map(|home| home.join(".config").join(APP_DIR)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_overrides() {
        let config = AppConfig::resolve(
            Some("/tmp/rc".to_string()),
            Some("Yes".to_string()),
            Some("debug".to_string()),
        );
        assert_eq!(config.config_dir, PathBuf::from("/tmp/rc"));
        assert!(config.start_enabled);
        assert_eq!(config.log_level, Level::DEBUG);
        assert!(config.notices.is_empty());
        assert_eq!(config.settings_file(), PathBuf::from("/tmp/rc/settings.toml"));
        assert_eq!(config.presets_dir(), PathBuf::from("/tmp/rc/presets"));
    }

    #[test]
    fn bad_values_keep_defaults() {
        let config = AppConfig::resolve(
            Some("  ".to_string()),
            Some("maybe".to_string()),
            Some("loud".to_string()),
        );
        assert_eq!(config.config_dir, AppConfig::default().config_dir);
        assert!(!config.start_enabled);
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.notices.iter().any(|n| n.contains(START_ENABLED_ENV)));
        assert!(config.notices.iter().any(|n| n.contains(LOG_ENV)));
    }
}
