//! Configuration management for reconflow.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. API credentials are deliberately absent:
//! they live in the settings store and are read through
//! [`SettingsProvider`](crate::settings::SettingsProvider).

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/reconflow/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Job store settings
    pub database: DatabaseConfig,
    /// Script adapter settings
    pub scripts: ScriptsConfig,
    /// HTTP source adapter settings
    pub sources: SourcesConfig,
    /// Progress bus settings
    pub events: EventsConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `RECONFLOW_DATABASE_PATH`: Override the job store location
    /// - `RECONFLOW_DATA_DIR`: Re-root the log and target output directories
    /// - `RECONFLOW_SCRIPT_DIR`: Override the script directory
    /// - `RECONFLOW_REQUEST_TIMEOUT_SECS`: Override the HTTP source timeout
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("RECONFLOW_DATABASE_PATH") {
            tracing::debug!("Override database.path from env: {}", path);
            self.database.path = PathBuf::from(path);
        }

        if let Some(dir) = lookup("RECONFLOW_DATA_DIR") {
            tracing::debug!("Override data directories from env: {}", dir);
            let root = PathBuf::from(dir);
            self.scripts.log_dir = root.join("outputs");
            self.scripts.targets_dir = root.join("targets");
        }

        if let Some(dir) = lookup("RECONFLOW_SCRIPT_DIR") {
            tracing::debug!("Override scripts.script_dir from env: {}", dir);
            self.scripts.script_dir = PathBuf::from(dir);
        }

        if let Some(val) = lookup("RECONFLOW_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.sources.request_timeout_secs = secs;
                tracing::debug!("Override sources.request_timeout_secs from env: {}", secs);
            }
        }
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sources.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sources.request_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "events.channel_capacity".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> ConfigResult<()> {
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/reconflow/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/reconflow`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "reconflow", "reconflow").ok_or(ConfigError::NoConfigDir)
}

/// Data directory, or a relative `data/` fallback when XDG paths are unavailable.
fn default_data_dir() -> PathBuf {
    AppConfig::data_dir().unwrap_or_else(|_| PathBuf::from("data"))
}

/// Job store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file (`:memory:` for an in-memory store)
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir().join("reconflow.db"),
        }
    }
}

/// Script adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Directory the named scripts are resolved from
    pub script_dir: PathBuf,
    /// Interpreter used to run scripts; empty runs the script file directly
    pub interpreter: String,
    /// Directory holding one append-only `<job-id>.log` per script job
    pub log_dir: PathBuf,
    /// Directory holding one output folder per target domain
    pub targets_dir: PathBuf,
    /// Seconds to wait after SIGTERM before force-killing a script
    pub kill_grace_secs: u64,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            script_dir: data_dir.join("scripts"),
            interpreter: "bash".to_string(),
            log_dir: data_dir.join("outputs"),
            targets_dir: data_dir.join("targets"),
            kill_grace_secs: 5,
        }
    }
}

/// HTTP source adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// User agent string sent to every provider
    pub user_agent: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            user_agent: concat!("reconflow/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Progress bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Buffered events per scope before slow observers start lagging
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scripts.interpreter, "bash");
        assert_eq!(config.scripts.kill_grace_secs, 5);
        assert_eq!(config.sources.request_timeout_secs, 30);
        assert_eq!(config.events.channel_capacity, 256);
        assert!(config.sources.user_agent.starts_with("reconflow/"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [sources]
            request_timeout_secs = 5
            "#,
        )
        .expect("parse partial config");

        assert_eq!(config.sources.request_timeout_secs, 5);
        assert_eq!(config.events.channel_capacity, 256);
        assert_eq!(config.scripts.interpreter, "bash");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.scripts.interpreter = "sh".to_string();
        config.save_to(&path).expect("save config");

        let loaded = AppConfig::load_from(&path).expect("load config");
        assert_eq!(loaded.scripts.interpreter, "sh");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let loaded = AppConfig::load_from(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(loaded.sources.request_timeout_secs, 30);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("RECONFLOW_DATABASE_PATH", "/tmp/recon.db"),
            ("RECONFLOW_DATA_DIR", "/srv/recon"),
            ("RECONFLOW_SCRIPT_DIR", "/opt/scripts"),
            ("RECONFLOW_REQUEST_TIMEOUT_SECS", "12"),
        ]);

        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/recon.db"));
        assert_eq!(config.scripts.log_dir, PathBuf::from("/srv/recon/outputs"));
        assert_eq!(config.scripts.targets_dir, PathBuf::from("/srv/recon/targets"));
        assert_eq!(config.scripts.script_dir, PathBuf::from("/opt/scripts"));
        assert_eq!(config.sources.request_timeout_secs, 12);
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[sources]\nrequest_timeout_secs = 0\n").expect("write config");

        let err = AppConfig::load_from(&path).expect_err("zero timeout rejected");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
