//! Synchronization service configuration
//!
//! Configuration is read from an optional TOML file (`SYNC_CONFIG_FILE`) and
//! then overridden by environment variables, so a deployment can ship one file
//! and tweak single values per environment.
//!
//! | Key                      | Environment variable        | Default                          |
//! |--------------------------|-----------------------------|----------------------------------|
//! | `server_port`            | `SERVER_PORT`               | `3000`                           |
//! | `database_url`           | `DATABASE_URL`              | unset (in-memory store)          |
//! | `discord.bot_token`      | `DISCORD_BOT_TOKEN`         | unset                            |
//! | `discord.api_base_url`   | `DISCORD_API_BASE_URL`      | `https://discord.com/api/v10`    |
//! | `fanout_concurrency`     | `SYNC_FANOUT_CONCURRENCY`   | `5`                              |
//! | `backfill_concurrency`   | `SYNC_BACKFILL_CONCURRENCY` | `5`                              |
//! | `backfill_batch_size`    | `SYNC_BACKFILL_BATCH_SIZE`  | `100`                            |
//! | `retry.max_attempts`     | `SYNC_RETRY_MAX_ATTEMPTS`   | `3`                              |
//! | `retry.base_delay_ms`    | `SYNC_RETRY_BASE_DELAY_MS`  | `250`                            |
//! | `retry.max_delay_ms`     | `SYNC_RETRY_MAX_DELAY_MS`   | `2000`                           |
//! | `cdc_webhook_secret`     | `CDC_WEBHOOK_SECRET`        | unset (webhook unauthenticated)  |

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_DISCORD_API_BASE_URL: &str = "https://discord.com/api/v10";

/// Discord adapter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub bot_token: Option<String>,
    pub api_base_url: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base_url: DEFAULT_DISCORD_API_BASE_URL.to_string(),
        }
    }
}

/// Provider call retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 2_000,
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub server_port: u16,
    pub database_url: Option<String>,
    pub discord: DiscordConfig,
    pub fanout_concurrency: usize,
    pub backfill_concurrency: usize,
    pub backfill_batch_size: usize,
    pub retry: RetrySettings,
    pub cdc_webhook_secret: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_port: 3000,
            database_url: None,
            discord: DiscordConfig::default(),
            fanout_concurrency: 5,
            backfill_concurrency: 5,
            backfill_batch_size: 100,
            retry: RetrySettings::default(),
            cdc_webhook_secret: None,
        }
    }
}

impl SyncConfig {
    /// Create a new SyncConfigBuilder
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    /// Defaults, then `SYNC_CONFIG_FILE` if set, then environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = match std::env::var("SYNC_CONFIG_FILE") {
            Ok(path) if !path.is_empty() => Self::from_file(path)?,
            _ => Self::default(),
        };
        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(port) = env_parse::<u16>("SERVER_PORT")? {
            self.server_port = port;
        }
        if let Some(url) = env_string("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(token) = env_string("DISCORD_BOT_TOKEN") {
            self.discord.bot_token = Some(token);
        }
        if let Some(url) = env_string("DISCORD_API_BASE_URL") {
            self.discord.api_base_url = url;
        }
        if let Some(value) = env_parse::<usize>("SYNC_FANOUT_CONCURRENCY")? {
            self.fanout_concurrency = value;
        }
        if let Some(value) = env_parse::<usize>("SYNC_BACKFILL_CONCURRENCY")? {
            self.backfill_concurrency = value;
        }
        if let Some(value) = env_parse::<usize>("SYNC_BACKFILL_BATCH_SIZE")? {
            self.backfill_batch_size = value;
        }
        if let Some(value) = env_parse::<u32>("SYNC_RETRY_MAX_ATTEMPTS")? {
            self.retry.max_attempts = value;
        }
        if let Some(value) = env_parse::<u64>("SYNC_RETRY_BASE_DELAY_MS")? {
            self.retry.base_delay_ms = value;
        }
        if let Some(value) = env_parse::<u64>("SYNC_RETRY_MAX_DELAY_MS")? {
            self.retry.max_delay_ms = value;
        }
        if let Some(secret) = env_string("CDC_WEBHOOK_SECRET") {
            self.cdc_webhook_secret = Some(secret);
        }
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fanout_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "fanout_concurrency",
                message: "must be at least 1".to_string(),
            });
        }
        if self.backfill_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "backfill_concurrency",
                message: "must be at least 1".to_string(),
            });
        }
        if self.backfill_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "backfill_batch_size",
                message: "must be at least 1".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retry.max_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::InvalidValue {
                key: "retry.max_delay_ms",
                message: "must not be smaller than retry.base_delay_ms".to_string(),
            });
        }
        if !self.discord.api_base_url.starts_with("http://")
            && !self.discord.api_base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidUrl(self.discord.api_base_url.clone()));
        }
        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key,
                message: format!("cannot parse '{}'", raw),
            }),
        None => Ok(None),
    }
}

/// Builder for SyncConfig
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn server_port(mut self, port: u16) -> Self {
        self.config.server_port = port;
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    pub fn discord_bot_token(mut self, token: impl Into<String>) -> Self {
        self.config.discord.bot_token = Some(token.into());
        self
    }

    pub fn discord_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.discord.api_base_url = url.into();
        self
    }

    pub fn fanout_concurrency(mut self, value: usize) -> Self {
        self.config.fanout_concurrency = value;
        self
    }

    pub fn backfill_concurrency(mut self, value: usize) -> Self {
        self.config.backfill_concurrency = value;
        self
    }

    pub fn backfill_batch_size(mut self, value: usize) -> Self {
        self.config.backfill_batch_size = value;
        self
    }

    pub fn retry(mut self, retry: RetrySettings) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn cdc_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.cdc_webhook_secret = Some(secret.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("failed to read configuration: {0}")]
    Io(String),
}
