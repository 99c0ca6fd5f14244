//! Configuration management.
//!
//! Stores configuration in JSON format at `~/.podfwd/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

/// Name of the per-user configuration directory under `$HOME`.
pub const CONFIG_DIR: &str = ".podfwd";

/// Configuration data stored in JSON format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Local bind address offered in the start dialog.
    #[serde(default = "default_address")]
    pub default_address: String,

    /// Namespace the console lists pods from.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Explicit kubectl binary; searched for when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubectl_path: Option<PathBuf>,

    /// kubectl context passed as `--context`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Seconds to wait for a tunnel to report readiness.
    #[serde(default = "default_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Seconds to wait for kubectl fetch commands.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_address() -> String {
    "localhost".to_string()
}

fn default_namespace() -> String {
    crate::domain::DEFAULT_NAMESPACE.to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_address: default_address(),
            namespace: default_namespace(),
            kubectl_path: None,
            context: None,
            ready_timeout_secs: default_timeout_secs(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Configuration store for managing app settings.
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store with the default path.
    ///
    /// Default path: `~/.podfwd/config.json`
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_path: config_dir()?.join("config.json"),
        })
    }

    /// Create a config store with a custom path.
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Get the configuration file path.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from disk.
    ///
    /// Returns default config if the file doesn't exist.
    pub async fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub async fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        // Write atomically by writing to temp file then renaming
        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to create temp config file: {}", e)))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        file.sync_all()
            .await
            .map_err(|e| Error::Config(format!("Failed to sync config: {}", e)))?;

        fs::rename(&temp_path, &self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to rename config file: {}", e)))?;

        Ok(())
    }
}

/// Returns `~/.podfwd`.
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
    Ok(home.join(CONFIG_DIR))
}
