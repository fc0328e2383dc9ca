//! Runner settings.
//!
//! Settings are read from an optional YAML file. Every field has a default,
//! so a missing file or a partial one is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors raised while loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("netbed-export")
}

fn default_ssh_binary() -> String {
    "ssh".to_string()
}

fn default_scp_binary() -> String {
    "scp".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_control_persist() -> Duration {
    Duration::from_secs(30 * 60)
}

/// How remote nodes are reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshSettings {
    #[serde(default = "default_ssh_binary")]
    pub binary: String,
    #[serde(default = "default_scp_binary")]
    pub scp_binary: String,
    /// Never prompt for passwords.
    #[serde(default = "default_true")]
    pub batch_mode: bool,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,
    /// How long the control master outlives the last session.
    #[serde(default = "default_control_persist", with = "humantime_serde")]
    pub control_persist: Duration,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            binary: default_ssh_binary(),
            scp_binary: default_scp_binary(),
            batch_mode: true,
            connect_timeout: default_connect_timeout(),
            identity_file: None,
            control_persist: default_control_persist(),
        }
    }
}

/// Top-level runner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub ssh: SshSettings,
    /// Drive nodes concurrently.
    #[serde(default = "default_true")]
    pub parallel: bool,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            ssh: SshSettings::default(),
            parallel: true,
            export_dir: default_export_dir(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(SettingsError::Invalid {
                field: "log_level",
                reason: format!("unknown level {:?}, expected one of {}", self.log_level, LOG_LEVELS.join(", ")),
            });
        }
        if self.ssh.binary.trim().is_empty() {
            return Err(SettingsError::Invalid {
                field: "ssh.binary",
                reason: "cannot be empty".to_string(),
            });
        }
        if self.ssh.scp_binary.trim().is_empty() {
            return Err(SettingsError::Invalid {
                field: "ssh.scp_binary",
                reason: "cannot be empty".to_string(),
            });
        }
        if self.ssh.connect_timeout.is_zero() {
            return Err(SettingsError::Invalid {
                field: "ssh.connect_timeout",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Load settings from `path`; defaults when no path is given.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, SettingsError> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    log::info!("Loading settings from: {:?}", path);

    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let settings: Settings = if content.trim().is_empty() {
        Settings::default()
    } else {
        serde_yaml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.display().to_string(),
            source,
        })?
    };
    settings.validate()?;
    Ok(settings)
}
