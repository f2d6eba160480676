//! Registry process configuration.
//!
//! Read from the environment once at start-up:
//! - `MDSERVER_HOST` - listen address. Defaults to `127.0.0.1`.
//! - `MDSERVER_PORT` - listen port. Defaults to `4200`.
//! - `MDSERVER_FETCH_TIMEOUT_SECS` - per-page fetch budget for `web_search`. Defaults to `10`.
//! - `MDSERVER_USER_AGENT` - user agent sent to upstream sites.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4200;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, message } => write!(f, "invalid value for {key}: {message}"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub fetch_timeout: Duration,
    pub user_agent: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("MDSERVER_HOST")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(defaults.host);

        let port = lookup("MDSERVER_PORT")
            .map(|value| {
                value
                    .trim()
                    .parse::<u16>()
                    .map_err(|err| ConfigError::invalid_value("MDSERVER_PORT", err.to_string()))
            })
            .transpose()?
            .unwrap_or(defaults.port);

        let fetch_timeout = lookup("MDSERVER_FETCH_TIMEOUT_SECS")
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|err| {
                        ConfigError::invalid_value("MDSERVER_FETCH_TIMEOUT_SECS", err.to_string())
                    })
                    .and_then(|secs| match secs {
                        0 => Err(ConfigError::invalid_value(
                            "MDSERVER_FETCH_TIMEOUT_SECS",
                            "must be at least 1",
                        )),
                        secs => Ok(Duration::from_secs(secs)),
                    })
            })
            .transpose()?
            .unwrap_or(defaults.fetch_timeout);

        let user_agent = lookup("MDSERVER_USER_AGENT")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(defaults.user_agent);

        Ok(Self {
            host,
            port,
            fetch_timeout,
            user_agent,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
