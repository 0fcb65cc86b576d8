//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the auth service URL, request timeout, idle timeout policy, where the
//! session is stored and the last email used to sign in.
//!
//! Configuration is stored at `~/.config/authshell/config.json`. A few
//! settings can be overridden from the environment (see [`Config::apply_env`]).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{ApiClient, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::auth::{FileStorage, IdlePolicy, KeyringStorage, MemoryStorage, SessionStorage};

/// Application name used for config/data directory paths
const APP_NAME: &str = "authshell";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Overrides the auth service base URL
pub const ENV_API_URL: &str = "AUTHSHELL_API_URL";

/// Overrides the idle timeout, in minutes
pub const ENV_IDLE_TIMEOUT_MINUTES: &str = "AUTHSHELL_IDLE_TIMEOUT_MINUTES";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub idle_timeout_minutes: u64,
    pub idle_poll_seconds: u64,
    pub storage: StorageBackend,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            idle_timeout_minutes: 30,
            idle_poll_seconds: 60,
            storage: StorageBackend::File,
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path).context("Failed to read config file")?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the session file and logs
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Apply overrides from the environment. Unparsable values are ignored.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(raw) = lookup(ENV_IDLE_TIMEOUT_MINUTES) {
            match raw.trim().parse::<u64>() {
                Ok(minutes) if minutes > 0 => self.idle_timeout_minutes = minutes,
                _ => warn!(value = %raw, "Ignoring invalid {}", ENV_IDLE_TIMEOUT_MINUTES),
            }
        }
    }

    pub fn idle_policy(&self) -> IdlePolicy {
        IdlePolicy::new(
            Duration::from_secs(self.idle_timeout_minutes.saturating_mul(60)),
            Duration::from_secs(self.idle_poll_seconds),
        )
    }

    pub fn api_client(&self) -> Result<ApiClient> {
        ApiClient::with_timeout(
            self.api_base_url.clone(),
            Duration::from_secs(self.request_timeout_secs),
        )
        .context("Failed to create HTTP client")
    }

    /// Build the configured session storage backend
    pub fn session_storage(&self) -> Result<Box<dyn SessionStorage>> {
        Ok(match self.storage {
            StorageBackend::File => {
                let storage = FileStorage::new(self.data_dir()?);
                debug!(path = %storage.path().display(), "Using file session storage");
                Box::new(storage)
            }
            StorageBackend::Keyring => Box::new(KeyringStorage::new()),
            StorageBackend::Memory => Box::new(MemoryStorage::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:5000/api");
        assert_eq!(config.idle_policy(), IdlePolicy::default());
        assert_eq!(config.storage, StorageBackend::File);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"storage": "keyring", "idle_timeout_minutes": 5}"#)
                .expect("config");
        assert_eq!(config.storage, StorageBackend::Keyring);
        assert_eq!(config.idle_policy().timeout, Duration::from_secs(300));
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_URL, "https://auth.example.com/api"),
            (ENV_IDLE_TIMEOUT_MINUTES, "10"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.api_base_url, "https://auth.example.com/api");
        assert_eq!(config.idle_timeout_minutes, 10);
    }

    #[test]
    fn test_invalid_env_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == ENV_IDLE_TIMEOUT_MINUTES).then(|| "soon".to_string()));
        assert_eq!(config.idle_timeout_minutes, 30);
    }
}
