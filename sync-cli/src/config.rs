//! Configuration management for the inperson CLI.
//!
//! Two files live in the data directory:
//! - `device.json`: the local user's identity (owner-only permissions)
//! - `inperson.toml`: node settings, every field optional

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Device identity file name.
pub const DEVICE_FILE: &str = "device.json";

/// Node settings file name.
pub const CONFIG_FILE: &str = "inperson.toml";

/// Device configuration stored locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Durable user id, advertised to nearby devices.
    pub user_id: String,
    /// Human-readable name for this user.
    pub name: String,
    /// When the device was initialized.
    pub created_at: DateTime<Utc>,
}

impl DeviceConfig {
    /// Create a new device configuration with a random user id.
    pub fn new(name: &str) -> Self {
        Self {
            user_id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Load device configuration from a directory.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(DEVICE_FILE);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .context("Device not initialized. Run 'inperson init' first.")?;
        serde_json::from_str(&contents).context("Invalid device configuration")
    }

    /// Save device configuration to a directory.
    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(DEVICE_FILE);
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, contents)
            .await
            .context("Failed to save device configuration")?;
        set_file_permissions_0600(&path).await?;
        Ok(())
    }

    /// Check if device is initialized.
    pub async fn exists(data_dir: &Path) -> bool {
        tokio::fs::try_exists(data_dir.join(DEVICE_FILE))
            .await
            .unwrap_or(false)
    }
}

/// Node settings loaded from `inperson.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Sync behaviour.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

/// Sync behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Housekeeping interval in seconds; 0 disables it (default: 60).
    #[serde(default = "default_housekeeping_interval")]
    pub housekeeping_interval_secs: u64,
    /// Re-share with connected friends on every housekeeping tick
    /// (default: true).
    #[serde(default = "default_rebroadcast")]
    pub rebroadcast: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence
    /// (default: "warn").
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default value functions
fn default_housekeeping_interval() -> u64 {
    60
}

fn default_rebroadcast() -> bool {
    true
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            housekeeping_interval_secs: default_housekeeping_interval(),
            rebroadcast: default_rebroadcast(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl SyncConfig {
    /// The housekeeping interval as a [`Duration`].
    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.housekeeping_interval_secs)
    }
}

impl NodeConfig {
    /// Load `inperson.toml` from `data_dir`, or the defaults if there is none.
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Write the configuration to `data_dir` unless a file already exists.
    pub async fn save_if_missing(&self, data_dir: &Path) -> Result<bool> {
        let path = data_dir.join(CONFIG_FILE);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(false);
        }
        let contents = toml::to_string_pretty(self).context("Failed to encode node configuration")?;
        tokio::fs::write(&path, contents)
            .await
            .context("Failed to save node configuration")?;
        Ok(true)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
