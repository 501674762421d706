//! Application configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! includes the backend base URL, the active business identifier, and the
//! last used sign-in email.
//!
//! Configuration is stored at `~/.config/tilldesk/config.json`. The base URL
//! can always be overridden from the environment, which takes precedence
//! over the file.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for the config directory path
const APP_NAME: &str = "tilldesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the backend base URL
pub const API_URL_ENV: &str = "TILLDESK_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub biz_id: Option<String>,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
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

    /// Resolve the backend base URL: environment first, then the config file.
    pub fn resolve_api_url(&self) -> Result<String> {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.is_empty() {
                return Ok(url);
            }
        }
        self.api_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("No API URL configured (set {} or api_url)", API_URL_ENV))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_api_url_precedence() {
        // Phases run in one test so the shared env var can't race.
        std::env::remove_var(API_URL_ENV);

        let empty = Config::default();
        assert!(empty.resolve_api_url().is_err());

        let configured = Config {
            api_url: Some("https://api.example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(
            configured.resolve_api_url().unwrap(),
            "https://api.example.com"
        );

        std::env::set_var(API_URL_ENV, "https://override.example.com");
        assert_eq!(
            configured.resolve_api_url().unwrap(),
            "https://override.example.com"
        );
        std::env::remove_var(API_URL_ENV);
    }
}
