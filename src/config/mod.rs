pub mod connection_config;
pub mod discovery_config;

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::connection_config::{ConnectionConfig, PairingConfig};
use crate::config::discovery_config::DiscoveryConfig;
use crate::core::bluetooth::StateCodePolicy;
use crate::utils::ensure_directory_exists;

const CONFIG_DIR_NAME: &str = "bt-device-monitor";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub discovery: DiscoveryConfig,
    pub connection: ConnectionConfig,
    pub pairing: PairingConfig,
    /// What to do with state codes the monitor does not recognise.
    pub state_code_policy: StateCodePolicy,
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            discovery: DiscoveryConfig::default(),
            connection: ConnectionConfig::default(),
            pairing: PairingConfig::default(),
            state_code_policy: StateCodePolicy::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// `<config dir>/bt-device-monitor/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config from a configuration file, falling back to defaults
    /// when the file does not exist.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file_path = path.as_ref();
        match Self::try_load(file_path).await? {
            Some(config) => {
                info!("Config loaded from {:?}", file_path);
                Ok(config)
            }
            None => {
                warn!("Config file not found at {:?}, using default.", file_path);
                Ok(Self::default())
            }
        }
    }

    /// Reads the config without logging. `None` when the file does not exist,
    /// for callers that load it before the logger is installed.
    pub async fn try_load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let file_path = path.as_ref();
        if !file_path.exists() {
            return Ok(None);
        }

        let config_json = fs::read_to_string(file_path).await?;
        Ok(Some(serde_json::from_str(&config_json)?))
    }

    /// Saves the config, creating the parent directory if needed.
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file_path = path.as_ref();
        if let Some(config_dir) = file_path.parent() {
            ensure_directory_exists(config_dir).await?;
        }

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(file_path, config_json).await?;
        info!("Config saved to {:?}.", file_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn try_load_tells_missing_from_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert_eq!(AppConfig::try_load(&path).await.unwrap(), None);

        AppConfig::default().save(&path).await.unwrap();
        assert_eq!(AppConfig::try_load(&path).await.unwrap(), Some(AppConfig::default()));
    }

    #[tokio::test]
    async fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut config = AppConfig::default();
        config.discovery.duration_secs = 30;
        config.pairing.auto_confirm = true;
        config.state_code_policy = StateCodePolicy::Strict;

        config.save(&path).await.unwrap();
        assert_eq!(AppConfig::load(&path).await.unwrap(), config);
    }

    #[tokio::test]
    async fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"connection": {"max_retries": 7}, "state_code_policy": "strict"}"#)
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.connection.max_retries, 7);
        assert_eq!(config.connection.retry_delay_ms, ConnectionConfig::default().retry_delay_ms);
        assert_eq!(config.state_code_policy, StateCodePolicy::Strict);
        assert_eq!(config.log_level, "info");
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::load(&path).await.is_err());
    }
}
