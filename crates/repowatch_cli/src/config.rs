//! Configuration file support for repowatch.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `REPOWATCH_`, sections separated by
//!    `__`, e.g. `REPOWATCH_GITHUB__TOKEN`, `REPOWATCH_SYNC__INTERVAL_SECS`)
//! 3. Config file (./repowatch.toml, then ~/.config/repowatch/config.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/repowatch/repowatch.db?mode=rwc"  # optional, this is the default
//!
//! [github]
//! token = "ghp_..."  # or use REPOWATCH_GITHUB__TOKEN
//! api_url = "https://api.github.com"
//! timeout_secs = 30
//!
//! [sync]
//! interval_secs = 3600
//! default_repository = "chromium/chromium"
//!
//! [rate_limit]
//! low_quota_warning = 100
//! requests_per_second = 10  # optional proactive pacing
//!
//! [api]
//! bind = "127.0.0.1:8081"
//! ```

use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigBuilder as Builder, Environment, File, FileFormat};
use config::builder::DefaultState;
use directories::ProjectDirs;
use repowatch::platform::{ParseRepoRefError, RepoRef};
use serde::Deserialize;
use thiserror::Error;

const APP_NAME: &str = "repowatch";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("sync.interval_secs must be greater than zero")]
    ZeroInterval,

    #[error("github.timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("Invalid sync.default_repository: {0}")]
    DefaultRepository(#[from] ParseRepoRefError),

    #[error("Invalid api.bind address {addr:?}: {source}")]
    BindAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    #[error("Could not determine a database location; set database.url")]
    NoDatabaseUrl,
}

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub github: GitHubConfig,
    pub sync: SyncConfig,
    pub rate_limit: RateLimitConfig,
    pub api: ApiConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    pub url: Option<String>,
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Personal access token. Unauthenticated requests get a much smaller quota.
    pub token: Option<String>,
    pub api_url: String,
    /// Wall-clock timeout for each API call.
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: repowatch::github::DEFAULT_API_URL.to_string(),
            timeout_secs: repowatch::github::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// Poll worker configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_secs: u64,
    /// Repository synced on first start when nothing is tracked yet.
    pub default_repository: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: repowatch::sync::DEFAULT_POLL_INTERVAL.as_secs(),
            default_repository: "chromium/chromium".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub low_quota_warning: i64,
    pub requests_per_second: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            low_quota_warning: repowatch::platform::DEFAULT_LOW_QUOTA_WARNING,
            requests_per_second: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8081".to_string(),
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/repowatch/config.toml)
    /// 3. Local config file (./repowatch.toml)
    /// 4. Environment variables with REPOWATCH_ prefix
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        let local_config = PathBuf::from("repowatch.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./repowatch.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        Self::build(builder.add_source(
            Environment::with_prefix("REPOWATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        ))
    }

    fn build(builder: Builder<DefaultState>) -> Result<Self, ConfigError> {
        Ok(builder.build()?.try_deserialize::<Config>()?)
    }

    /// Parse configuration from a TOML document, on top of the defaults.
    #[cfg(test)]
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::build(ConfigBuilder::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    /// Reject values the service cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.github.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        self.default_repository()?;
        self.bind_addr()?;
        Ok(())
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter creates the SQLite file if it doesn't exist.
    pub fn database_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.database.url {
            return Ok(url.clone());
        }
        Self::default_state_dir()
            .map(|state_dir| {
                let db_path = state_dir.join("repowatch.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
            .ok_or(ConfigError::NoDatabaseUrl)
    }

    pub fn github_token(&self) -> Option<&str> {
        self.github.token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn github_timeout(&self) -> Duration {
        Duration::from_secs(self.github.timeout_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn default_repository(&self) -> Result<RepoRef, ConfigError> {
        Ok(self.sync.default_repository.parse()?)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.api
            .bind
            .parse()
            .map_err(|source| ConfigError::BindAddress {
                addr: self.api.bind.clone(),
                source,
            })
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/repowatch` or `~/.local/state/repowatch`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}
