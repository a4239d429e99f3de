//! Client configuration.
//!
//! Provides a `ClientConfig` struct shared by every front end to locate the
//! catalog API and tune throttling, timeouts and retry backoff.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const API_URL_ENV: &str = "WAYLIST_API_URL";
pub const TOKEN_ENV: &str = "WAYLIST_TOKEN";

const DEFAULT_API_BASE_URL: &str = "https://api.waylist.app";
const DEFAULT_CATALOG_THROTTLE_SECS: u64 = 60 * 60;
const DEFAULT_USER_THROTTLE_SECS: u64 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_BASE_SECS: u64 = 2;
const DEFAULT_RETRY_MAX_SECS: u64 = 5 * 60;

/// Runtime configuration for the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Minimum age of a public catalog response before it is refetched.
    #[serde(default = "default_catalog_throttle_secs")]
    pub catalog_throttle_secs: u64,
    /// Minimum age of a user-scoped response before it is refetched.
    #[serde(default = "default_user_throttle_secs")]
    pub user_throttle_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_retry_base_secs")]
    pub retry_base_secs: u64,
    #[serde(default = "default_retry_max_secs")]
    pub retry_max_secs: u64,
    /// Bearer token supplied out of band (env or config file).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            catalog_throttle_secs: DEFAULT_CATALOG_THROTTLE_SECS,
            user_throttle_secs: DEFAULT_USER_THROTTLE_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retry_base_secs: DEFAULT_RETRY_BASE_SECS,
            retry_max_secs: DEFAULT_RETRY_MAX_SECS,
            auth_token: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a JSON file, falling back to defaults when the
    /// file does not exist.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!(
                "Failed to parse config at {}: {error}",
                path.display()
            ))
        })?;
        config.validate()
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Apply `WAYLIST_API_URL` / `WAYLIST_TOKEN` overrides from the environment.
    #[must_use]
    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(url) = normalize_text_option(std::env::var(API_URL_ENV).ok()) {
            self.api_base_url = url;
        }
        if let Some(token) = normalize_text_option(std::env::var(TOKEN_ENV).ok()) {
            self.auth_token = Some(token);
        }
        self
    }

    /// Normalize and check field values.
    pub fn validate(mut self) -> Result<Self> {
        let url = normalize_text_option(Some(self.api_base_url.clone()))
            .ok_or_else(|| Error::Config("api_base_url must not be empty".to_string()))?;
        if !is_http_url(&url) {
            return Err(Error::Config(
                "api_base_url must include http:// or https://".to_string(),
            ));
        }
        self.api_base_url = url.trim_end_matches('/').to_string();
        self.auth_token = normalize_text_option(self.auth_token.take());

        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.retry_base_secs == 0 {
            return Err(Error::Config("retry_base_secs must be positive".to_string()));
        }
        if self.retry_max_secs < self.retry_base_secs {
            return Err(Error::Config(
                "retry_max_secs must not be smaller than retry_base_secs".to_string(),
            ));
        }
        Ok(self)
    }

    pub const fn catalog_throttle(&self) -> Duration {
        Duration::from_secs(self.catalog_throttle_secs)
    }

    pub const fn user_throttle(&self) -> Duration {
        Duration::from_secs(self.user_throttle_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

const fn default_catalog_throttle_secs() -> u64 {
    DEFAULT_CATALOG_THROTTLE_SECS
}

const fn default_user_throttle_secs() -> u64 {
    DEFAULT_USER_THROTTLE_SECS
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn default_retry_base_secs() -> u64 {
    DEFAULT_RETRY_BASE_SECS
}

const fn default_retry_max_secs() -> u64 {
    DEFAULT_RETRY_MAX_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ClientConfig::load_from_path(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "api_base_url": "https://staging.example.com/", "user_throttle_secs": 5 }"#,
        )
        .unwrap();

        let config = ClientConfig::load_from_path(&path).unwrap();
        assert_eq!(config.api_base_url, "https://staging.example.com");
        assert_eq!(config.user_throttle_secs, 5);
        assert_eq!(config.catalog_throttle_secs, DEFAULT_CATALOG_THROTTLE_SECS);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{ "unexpected": true }"#).unwrap();

        let error = ClientConfig::load_from_path(&path).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn validate_rejects_bad_urls_and_backoff() {
        let config = ClientConfig {
            api_base_url: "api.example.com".to_string(),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            retry_base_secs: 10,
            retry_max_secs: 1,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_request_timeout() {
        let config = ClientConfig {
            request_timeout_secs: 0,
            ..ClientConfig::default()
        };
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn saved_config_loads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        let config = ClientConfig {
            auth_token: Some("token-alice".to_string()),
            user_throttle_secs: 5,
            ..ClientConfig::default()
        };

        config.save_to_path(&path).unwrap();

        assert_eq!(ClientConfig::load_from_path(&path).unwrap(), config);
    }

    #[test]
    fn validate_drops_blank_token() {
        let config = ClientConfig {
            auth_token: Some("   ".to_string()),
            ..ClientConfig::default()
        }
        .validate()
        .unwrap();
        assert_eq!(config.auth_token, None);
    }
}
