//! Application configuration management.
//!
//! This module handles loading and saving the configuration, which includes
//! the auth API base URL, the token storage backend and the last used username.
//!
//! Configuration is stored at `~/.config/passage/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::TOKEN_TTL_DAYS;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "passage";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default auth API base URL
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Longest token lifetime accepted from the config file
pub const MAX_TOKEN_TTL_DAYS: i64 = 365;

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "PASSAGE_API_URL";

/// Where the persisted session token lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON file in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
    /// In-process only; nothing survives a restart
    Memory,
}

impl StorageBackend {
    /// Whether the backend can list its keys across restarts. The keychain
    /// cannot be enumerated, so a startup sweep would find nothing to evict;
    /// expired keychain tokens are still dropped lazily when read.
    pub fn supports_expiry_sweep(&self) -> bool {
        !matches!(self, StorageBackend::Keyring)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub storage: StorageBackend,
    pub token_ttl_days: i64,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            storage: StorageBackend::default(),
            token_ttl_days: TOKEN_TTL_DAYS,
            last_username: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply environment overrides on top of the file contents.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.is_empty() {
                self.api_base_url = url;
            }
        }
    }

    /// Token lifetime, clamped to between one and `MAX_TOKEN_TTL_DAYS` days.
    pub fn token_ttl(&self) -> chrono::Duration {
        let days = self.token_ttl_days.clamp(1, MAX_TOKEN_TTL_DAYS);
        chrono::Duration::try_days(days).unwrap_or_else(|| chrono::Duration::days(TOKEN_TTL_DAYS))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("passage-config-missing/config.json");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.storage, StorageBackend::File);
        assert_eq!(config.token_ttl_days, TOKEN_TTL_DAYS);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = std::env::temp_dir().join(format!("passage-config-{}", std::process::id()));
        let path = dir.join("config.json");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&path, r#"{"storage":"keyring","last_username":"ada"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.storage, StorageBackend::Keyring);
        assert_eq!(config.last_username.as_deref(), Some("ada"));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("passage-config-save-{}", std::process::id()));
        let path = dir.join("config.json");
        let config = Config {
            api_base_url: "https://admin.example.com/api".to_string(),
            storage: StorageBackend::Memory,
            token_ttl_days: 3,
            last_username: Some("grace".to_string()),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_base_url, "https://admin.example.com/api");
        assert_eq!(loaded.storage, StorageBackend::Memory);
        assert_eq!(loaded.token_ttl().num_days(), 3);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_token_ttl_has_floor() {
        let config = Config {
            token_ttl_days: 0,
            ..Default::default()
        };
        assert_eq!(config.token_ttl().num_days(), 1);
    }

    #[test]
    fn test_token_ttl_has_ceiling() {
        for days in [100_000_000, i64::MAX] {
            let config = Config {
                token_ttl_days: days,
                ..Default::default()
            };
            assert_eq!(config.token_ttl().num_days(), MAX_TOKEN_TTL_DAYS);
        }

        let config = Config {
            token_ttl_days: i64::MIN,
            ..Default::default()
        };
        assert_eq!(config.token_ttl().num_days(), 1);
    }

    #[test]
    fn test_keyring_backend_skips_expiry_sweep() {
        assert!(StorageBackend::File.supports_expiry_sweep());
        assert!(StorageBackend::Memory.supports_expiry_sweep());
        assert!(!StorageBackend::Keyring.supports_expiry_sweep());
    }
}
