//! Configuration module for codevault.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{Result, VaultError};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "CODEVAULT_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Config file path: `CODEVAULT_CONFIG`, or `config.toml`.
pub fn config_path() -> PathBuf {
    env_value(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// API tier configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Base URL of the storage tier.
    #[serde(default = "default_storage_url")]
    pub storage_url: String,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Whether to serve static files.
    #[serde(default)]
    pub serve_static: bool,
    /// Path to static files directory.
    #[serde(default = "default_static_path")]
    pub static_path: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_storage_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_static_path() -> String {
    "static".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_api_port(),
            storage_url: default_storage_url(),
            cors_origins: vec![],
            serve_static: false,
            static_path: default_static_path(),
        }
    }
}

/// Storage tier configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_storage_port")]
    pub port: u16,
    /// Root directory holding one subdirectory per codebase.
    #[serde(default = "default_storage_root")]
    pub root: String,
}

fn default_storage_port() -> u16 {
    8081
}

fn default_storage_root() -> String {
    "storage".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_storage_port(),
            root: default_storage_root(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL (e.g. `sqlite://data/codevault.db` or `postgres://...`).
    #[serde(default = "default_db_url")]
    pub url: String,
}

fn default_db_url() -> String {
    "sqlite://data/codevault.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
        }
    }
}

/// Upload limits.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum request body size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
}

fn default_max_upload_size() -> u64 {
    100
}

impl UploadConfig {
    /// Maximum request body size in bytes.
    ///
    /// Saturates instead of overflowing for absurd configured values.
    pub fn max_upload_bytes(&self) -> usize {
        let bytes = self.max_upload_size_mb.saturating_mul(1024 * 1024);
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_size_mb: default_max_upload_size(),
        }
    }
}

/// Ledger maintenance configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Age in seconds after which a pending upload is considered abandoned.
    #[serde(default = "default_pending_grace")]
    pub pending_grace_secs: u64,
    /// Interval in seconds between pending-upload sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_pending_grace() -> u64 {
    3600 // 1 hour
}

fn default_sweep_interval() -> u64 {
    600 // 10 minutes
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            pending_grace_secs: default_pending_grace(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file, written in addition to stdout.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// API tier configuration.
    #[serde(default)]
    pub api: ApiConfig,
    /// Storage tier configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Upload limits.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Ledger maintenance.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(VaultError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Startup configuration for both binaries.
    ///
    /// Falls back to the defaults when `path` cannot be loaded, returning
    /// the load error alongside. Environment overrides apply either way.
    pub fn load_or_default(path: &Path) -> (Self, Option<VaultError>) {
        match Self::load_with_env(path) {
            Ok(config) => (config, None),
            Err(e) => {
                let mut config = Self::default();
                config.apply_env_overrides();
                (config, Some(e))
            }
        }
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| VaultError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables (empty values are ignored):
    /// - `CODEVAULT_DATABASE_URL`
    /// - `CODEVAULT_STORAGE_URL`
    /// - `CODEVAULT_STORAGE_ROOT`
    /// - `CODEVAULT_API_PORT`
    /// - `CODEVAULT_STORAGE_PORT`
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = env_value("CODEVAULT_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(url) = env_value("CODEVAULT_STORAGE_URL") {
            self.api.storage_url = url;
        }
        if let Some(root) = env_value("CODEVAULT_STORAGE_ROOT") {
            self.storage.root = root;
        }
        if let Some(port) = env_value("CODEVAULT_API_PORT").and_then(|p| p.parse().ok()) {
            self.api.port = port;
        }
        if let Some(port) = env_value("CODEVAULT_STORAGE_PORT").and_then(|p| p.parse().ok()) {
            self.storage.port = port;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.storage_url).map_err(|e| {
            VaultError::Config(format!(
                "api.storage_url '{}' is not a valid URL: {e}",
                self.api.storage_url
            ))
        })?;
        if self.upload.max_upload_size_mb == 0 {
            return Err(VaultError::Config(
                "upload.max_upload_size_mb must be greater than zero".to_string(),
            ));
        }
        if self.storage.root.trim().is_empty() {
            return Err(VaultError::Config("storage.root must not be empty".to_string()));
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
