//! Client configuration
//!
//! Config precedence: env vars > config file > defaults. The session token
//! file path is optional; without it the client keeps the session in memory
//! only and a restart starts anonymous.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Upstream API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Session persistence settings
#[derive(Debug, Default, Deserialize)]
pub struct AuthConfig {
    /// Path of the persisted token file.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

fn default_timeout() -> u64 {
    30
}

/// Errors from configuration loading and client construction.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("token store error: {0}")]
    Store(#[from] session_auth::Error),
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment
    /// variables. `API_BASE_URL` overrides the file's base_url.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(url) = std::env::var("API_BASE_URL") {
            if !url.is_empty() {
                config.api.base_url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.api.base_url.starts_with("http://")
            && !self.api.base_url.starts_with("https://")
        {
            return Err(ConfigError::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}
