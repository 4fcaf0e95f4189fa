//! Server configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `ENTITY_CONFIG_*` environment variables, then command-line flags.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use entity_config_core::{ValidationEngine, DEFAULT_CACHE_CAPACITY, DEFAULT_CONTAINER_KEY};
use entity_config_storage::StorageKind;

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "ENTITY_CONFIG_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime settings of the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Storage backend
    pub storage: StorageKind,
    /// Directory of the sled database
    pub data_dir: PathBuf,
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Expose `/metrics`
    pub metrics: bool,
    /// Key the validated payload lives under, used in issue paths
    pub container_key: String,
    /// Compiled schemas kept before the cache is reset
    pub cache_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            storage: StorageKind::Memory,
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            log_json: false,
            metrics: true,
            container_key: DEFAULT_CONTAINER_KEY.to_string(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Read a TOML file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Defaults or `path`, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `ENTITY_CONFIG_*` variables from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, keyed by full variable name.
    ///
    /// Values that do not parse are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        override_with(&lookup, "HOST", &mut self.host);
        override_with(&lookup, "PORT", &mut self.port);
        override_with(&lookup, "STORAGE", &mut self.storage);
        override_with(&lookup, "DATA_DIR", &mut self.data_dir);
        override_with(&lookup, "LOG_LEVEL", &mut self.log_level);
        override_with(&lookup, "LOG_JSON", &mut self.log_json);
        override_with(&lookup, "METRICS", &mut self.metrics);
        override_with(&lookup, "CONTAINER_KEY", &mut self.container_key);
        override_with(&lookup, "CACHE_CAPACITY", &mut self.cache_capacity);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.container_key.trim().is_empty() {
            return Err(ConfigError::Invalid("container_key must not be empty".to_string()));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid("cache_capacity must be at least 1".to_string()));
        }
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("invalid listen address '{}:{}': {}", self.host, self.port, e)))
    }

    /// Validation engine with the built-in rules and these settings
    pub fn build_engine(&self) -> ValidationEngine {
        ValidationEngine::with_builtins()
            .with_container_key(self.container_key.clone())
            .with_cache_capacity(self.cache_capacity)
    }
}

fn override_with<F, T>(lookup: &F, suffix: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let key = format!("{}{}", ENV_PREFIX, suffix);
    if let Some(raw) = lookup(&key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => warn!(key = %key, value = %raw, "Ignoring invalid configuration override"),
        }
    }
}
