//! Configuration loading for pipedeck.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `PIPEDECK_`, producing a typed [`AppConfig`].

use std::{collections::HashMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application configuration derived from `PIPEDECK_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crypto_key: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_repo: Option<String>,
    #[serde(default = "default_github_refresh_interval_seconds")]
    pub github_refresh_interval_seconds: u64,
    #[serde(default)]
    pub poller: PollerConfig,
}

/// Poller-specific configuration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PollerConfig {
    #[serde(default = "default_poller_default_interval_seconds")]
    pub default_interval_seconds: u64,
    #[serde(default = "default_poller_stop_join_timeout_seconds")]
    pub stop_join_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            crypto_key: None,
            github_api_base: None,
            github_owner: None,
            github_repo: None,
            github_refresh_interval_seconds: default_github_refresh_interval_seconds(),
            poller: PollerConfig::default(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            default_interval_seconds: default_poller_default_interval_seconds(),
            stop_join_timeout_seconds: default_poller_stop_join_timeout_seconds(),
        }
    }
}

impl PollerConfig {
    /// Validate poller configuration bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_interval_seconds == 0 {
            return Err(ConfigError::InvalidPollerInterval {
                value: self.default_interval_seconds,
            });
        }
        if self.stop_join_timeout_seconds == 0 {
            return Err(ConfigError::InvalidPollerStopTimeout {
                value: self.stop_join_timeout_seconds,
            });
        }
        Ok(())
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.crypto_key.is_some() {
            config.crypto_key = Some(b"[REDACTED]".to_vec());
        }
        if !config.database_url.is_empty() && config.database_url != default_database_url() {
            config.database_url = "[REDACTED]".to_string();
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings
    /// are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref key) = self.crypto_key {
            if key.len() != 32 {
                return Err(ConfigError::InvalidCryptoKeyLength { length: key.len() });
            }
        } else {
            return Err(ConfigError::MissingCryptoKey);
        }

        if self.github_refresh_interval_seconds == 0 {
            return Err(ConfigError::InvalidRefreshInterval {
                value: self.github_refresh_interval_seconds,
            });
        }

        self.poller.validate()?;

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://pipedeck.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_github_refresh_interval_seconds() -> u64 {
    30
}

fn default_poller_default_interval_seconds() -> u64 {
    30
}

fn default_poller_stop_join_timeout_seconds() -> u64 {
    5
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("crypto key is missing; set PIPEDECK_CRYPTO_KEY environment variable")]
    MissingCryptoKey,
    #[error("crypto key is invalid base64: {error}")]
    InvalidCryptoKeyBase64 { error: String },
    #[error("crypto key must decode to exactly 32 bytes, got {length} bytes")]
    InvalidCryptoKeyLength { length: usize },
    #[error("provider refresh interval must be positive, got {value}")]
    InvalidRefreshInterval { value: u64 },
    #[error("poller default interval must be positive, got {value}")]
    InvalidPollerInterval { value: u64 },
    #[error("poller stop join timeout must be positive, got {value}")]
    InvalidPollerStopTimeout { value: u64 },
}

/// Loads configuration using layered `.env` files and `PIPEDECK_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads configuration: `.env`, then `.env.<profile>`, then the process
    /// environment, with later layers winning.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut layered = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("PIPEDECK_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_profile);
        let api_bind_addr = layered
            .remove("API_BIND_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_api_bind_addr);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);
        let database_url = layered
            .remove("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_database_url);
        let db_max_connections = layered
            .remove("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = layered
            .remove("DB_ACQUIRE_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_acquire_timeout_ms);

        // Parse and validate crypto key (base64-encoded 32 bytes)
        let crypto_key = match layered.remove("CRYPTO_KEY") {
            Some(key_str) if !key_str.is_empty() => {
                use base64::{Engine as _, engine::general_purpose};
                let decoded = general_purpose::STANDARD.decode(&key_str).map_err(|e| {
                    ConfigError::InvalidCryptoKeyBase64 {
                        error: e.to_string(),
                    }
                })?;
                Some(decoded)
            }
            _ => None,
        };

        let github_api_base = layered.remove("GITHUB_API_BASE").filter(|v| !v.is_empty());
        let github_owner = layered.remove("GITHUB_OWNER").filter(|v| !v.is_empty());
        let github_repo = layered.remove("GITHUB_REPO").filter(|v| !v.is_empty());
        let github_refresh_interval_seconds = layered
            .remove("GITHUB_REFRESH_INTERVAL_SECONDS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_github_refresh_interval_seconds);

        let poller = PollerConfig {
            default_interval_seconds: layered
                .remove("POLLER_DEFAULT_INTERVAL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_poller_default_interval_seconds),
            stop_join_timeout_seconds: layered
                .remove("POLLER_STOP_JOIN_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_poller_stop_join_timeout_seconds),
        };

        Ok(AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            crypto_key,
            github_api_base,
            github_owner,
            github_repo,
            github_refresh_interval_seconds,
            poller,
        })
    }

    /// Reads `.env` and `.env.<profile>` from the base directory into a map
    /// of `PIPEDECK_`-stripped keys. Missing files are fine; malformed files
    /// are an error.
    fn collect_layered_env(&self) -> Result<HashMap<String, String>, ConfigError> {
        let mut layered = HashMap::new();

        let base_file = self.base_dir.join(".env");
        self.merge_env_file(&base_file, &mut layered)?;

        let profile_hint = layered
            .get("PROFILE")
            .cloned()
            .or_else(|| env::var("PIPEDECK_PROFILE").ok())
            .unwrap_or_else(default_profile);

        let profile_file = self.base_dir.join(format!(".env.{}", profile_hint));
        self.merge_env_file(&profile_file, &mut layered)?;

        Ok(layered)
    }

    fn merge_env_file(
        &self,
        path: &PathBuf,
        layered: &mut HashMap<String, String>,
    ) -> Result<(), ConfigError> {
        if !path.exists() {
            return Ok(());
        }

        for item in dotenvy::from_path_iter(path).map_err(|source| ConfigError::EnvFile {
            path: path.clone(),
            source,
        })? {
            let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                path: path.clone(),
                source,
            })?;
            if let Some(stripped) = key.strip_prefix("PIPEDECK_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
