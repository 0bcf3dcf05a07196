//! # Gateway Configuration
//!
//! TOML-backed configuration for the gateway, with serde defaults for every
//! field so a partial file (or no file at all) yields a runnable config.
//!
//! ## Configuration Sections
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        GatewayConfig                                    │
//! │                                                                         │
//! │  [device]      liveness probe cadence, per-command timeout              │
//! │  [upload]      server host/port, credentials, device-name override      │
//! │  [store]       database/audit paths, pool size                          │
//! │  [scheduler]   batch size, worker permits, loop enables                 │
//! │                                                                         │
//! │  Credentials may be injected via environment:                           │
//! │    AIRGATE_UPLOAD_USERNAME / AIRGATE_UPLOAD_PASSWORD                    │
//! │  (env wins over file, so the file never has to hold secrets)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The default file location follows platform conventions via the
//! `directories` crate, e.g. `~/.config/airgate/airgate.toml` on Linux.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{SyncError, SyncResult};

const CONFIG_FILE: &str = "airgate.toml";
const USERNAME_ENV: &str = "AIRGATE_UPLOAD_USERNAME";
const PASSWORD_ENV: &str = "AIRGATE_UPLOAD_PASSWORD";

// =============================================================================
// Sections
// =============================================================================

/// Device session tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceSection {
    /// Seconds between liveness probes.
    pub liveness_interval_secs: u64,
    /// Per-command exchange timeout in seconds.
    pub command_timeout_secs: u64,
}

impl Default for DeviceSection {
    fn default() -> Self {
        DeviceSection {
            liveness_interval_secs: 5,
            command_timeout_secs: 5,
        }
    }
}

impl DeviceSection {
    pub fn liveness_interval(&self) -> Duration {
        Duration::from_secs(self.liveness_interval_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Storage-server endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadSection {
    pub host: String,
    pub port: u16,
    /// Overrides the device id as the server-side channel name.
    pub device_name: Option<String>,
    pub username: String,
    pub password: String,
}

impl Default for UploadSection {
    fn default() -> Self {
        UploadSection {
            host: String::new(),
            port: 8086,
            device_name: None,
            username: String::new(),
            password: String::new(),
        }
    }
}

/// Durable store paths and pool size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSection {
    /// SQLite file path. `None` uses the platform data directory.
    pub database_path: Option<PathBuf>,
    /// Audit sink path. `None` uses the platform data directory.
    pub audit_path: Option<PathBuf>,
    pub max_connections: u32,
}

impl Default for StoreSection {
    fn default() -> Self {
        StoreSection {
            database_path: None,
            audit_path: None,
            max_connections: 4,
        }
    }
}

/// Scheduler loop tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerSection {
    /// Maximum samples per upload batch.
    pub batch_size: usize,
    /// Concurrent upload worker permits.
    pub worker_permits: usize,
    pub acquisition_enabled: bool,
    pub upload_enabled: bool,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        SchedulerSection {
            batch_size: airgate_core::DEFAULT_BATCH_CAPACITY,
            worker_permits: 1,
            acquisition_enabled: true,
            upload_enabled: true,
        }
    }
}

// =============================================================================
// Gateway Config
// =============================================================================

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    pub device: DeviceSection,
    pub upload: UploadSection,
    pub store: StoreSection,
    pub scheduler: SchedulerSection,
}

impl GatewayConfig {
    /// Platform config file path, e.g. `~/.config/airgate/airgate.toml`.
    pub fn default_path() -> SyncResult<PathBuf> {
        let dirs = ProjectDirs::from("org", "airgate", "airgate")
            .ok_or_else(|| SyncError::ConfigLoadFailed("no home directory".to_string()))?;
        Ok(dirs.config_dir().join(CONFIG_FILE))
    }

    /// Platform data directory for the database and audit files.
    pub fn default_data_dir() -> SyncResult<PathBuf> {
        let dirs = ProjectDirs::from("org", "airgate", "airgate")
            .ok_or_else(|| SyncError::ConfigLoadFailed("no home directory".to_string()))?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Loads from a TOML file. Unknown keys are ignored; missing keys take
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> SyncResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: GatewayConfig = toml::from_str(&text)?;
        Ok(config)
    }

    /// Loads from the given path, falling back to defaults if the file does
    /// not exist. Other I/O or parse failures still error; a corrupt file
    /// should be fixed, not silently replaced.
    pub fn load_or_default(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            info!(path = %path.display(), "Loading gateway configuration");
            Self::load(path)
        } else {
            info!(path = %path.display(), "No configuration file, using defaults");
            Ok(GatewayConfig::default())
        }
    }

    /// Writes the config as TOML, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> SyncResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Applies credential overrides from the environment. Env wins over the
    /// file so deployments never have to write secrets to disk.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(username) = std::env::var(USERNAME_ENV) {
            self.upload.username = username;
        }
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            self.upload.password = password;
        }
        self
    }

    /// Validates the fields the engine cannot run without.
    pub fn validate(&self) -> SyncResult<()> {
        if self.scheduler.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "scheduler.batch_size must be at least 1".to_string(),
            ));
        }
        if self.scheduler.worker_permits == 0 {
            return Err(SyncError::InvalidConfig(
                "scheduler.worker_permits must be at least 1".to_string(),
            ));
        }
        if self.scheduler.upload_enabled {
            if self.upload.host.is_empty() {
                return Err(SyncError::InvalidConfig(
                    "upload.host is required when uploads are enabled".to_string(),
                ));
            }
            if self.upload.port == 0 {
                return Err(SyncError::InvalidConfig(
                    "upload.port must be non-zero".to_string(),
                ));
            }
            if self.upload.username.is_empty() {
                return Err(SyncError::InvalidConfig(format!(
                    "upload.username is required (file or {USERNAME_ENV})"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_operational_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.device.liveness_interval(), Duration::from_secs(5));
        assert_eq!(config.device.command_timeout(), Duration::from_secs(5));
        assert_eq!(config.upload.port, 8086);
        assert_eq!(config.scheduler.batch_size, 200);
        assert_eq!(config.scheduler.worker_permits, 1);
        assert!(config.scheduler.acquisition_enabled);
        assert!(config.scheduler.upload_enabled);
    }

    #[test]
    fn partial_file_takes_defaults_for_missing_keys() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [upload]
            host = "storage.example.org"
            username = "gw"
            password = "pw"

            [scheduler]
            batch_size = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.upload.host, "storage.example.org");
        assert_eq!(config.upload.port, 8086);
        assert_eq!(config.scheduler.batch_size, 50);
        assert_eq!(config.scheduler.worker_permits, 1);
        assert_eq!(config.device.liveness_interval_secs, 5);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("airgate.toml");

        let mut config = GatewayConfig::default();
        config.upload.host = "storage.example.org".into();
        config.store.database_path = Some(PathBuf::from("/var/lib/airgate/samples.db"));
        config.save(&path).unwrap();

        let loaded = GatewayConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_or_default_handles_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = GatewayConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn corrupt_file_is_an_error_not_a_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airgate.toml");
        std::fs::write(&path, "this is not toml [").unwrap();

        assert!(matches!(
            GatewayConfig::load_or_default(&path),
            Err(SyncError::ConfigLoadFailed(_))
        ));
    }

    #[test]
    fn validation_requires_endpoint_when_uploads_enabled() {
        let mut config = GatewayConfig::default();
        assert!(config.validate().is_err()); // no host

        config.upload.host = "storage.example.org".into();
        assert!(config.validate().is_err()); // no username

        config.upload.username = "gw".into();
        assert!(config.validate().is_ok());

        config.scheduler.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn disabled_uploads_skip_endpoint_validation() {
        let mut config = GatewayConfig::default();
        config.scheduler.upload_enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut config = GatewayConfig::default();
        config.upload.username = "from-file".into();

        std::env::set_var(USERNAME_ENV, "from-env");
        std::env::set_var(PASSWORD_ENV, "secret-env");
        let config = config.with_env_overrides();
        std::env::remove_var(USERNAME_ENV);
        std::env::remove_var(PASSWORD_ENV);

        assert_eq!(config.upload.username, "from-env");
        assert_eq!(config.upload.password, "secret-env");
    }
}
