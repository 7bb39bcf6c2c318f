//! Configuration loading for MediTrack ML.
//! Reads meditrack.toml from the current directory or the path in the
//! MEDITRACK_CONFIG env var. A missing file means "all defaults".

use std::path::{Path, PathBuf};

use meditrack_anomaly::AnomalyConfig;
use meditrack_ranker::SimilarityConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_ENV: &str = "MEDITRACK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "meditrack.toml";
/// Port override read from the environment.
pub const PORT_ENV: &str = "ML_SERVICE_PORT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("ML_SERVICE_PORT must be a port number, got {0:?}")]
    InvalidPort(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub providers: SimilarityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow any origin; the browser client is served from another port.
    #[serde(default = "bool_true")]
    pub permissive_cors: bool,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16    { 5000 }
fn bool_true()    -> bool   { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            permissive_cors: bool_true(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load `.env`, then the TOML file, then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }

        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_path(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse `path`; a file that does not exist yields the defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(PORT_ENV) {
            self.server.port = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.anomaly
            .validate()
            .and_then(|()| self.providers.validate())
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
