//! Agent process configuration.
//!
//! Read from the environment once at start-up. `OPENAI_API_KEY` is the only
//! required key; everything else falls back to the defaults below.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use mdmemory::BackendConfig;
use mdprovider::SecretString;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.0;
pub const DEFAULT_REGISTRY_URL: &str = "http://127.0.0.1:4200/mcp";
pub const DEFAULT_SESSION_ID: &str = "conversation_1";
pub const DEFAULT_MAX_STEPS: u32 = mdchat::DEFAULT_MAX_STEPS;
pub const DEFAULT_SQLITE_PATH: &str = ".marketdesk/sessions.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingEnvVar(String),
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
            Self::MissingEnvVar(key) => write!(f, "missing required environment variable {key}"),
            Self::InvalidValue { key, message } => write!(f, "invalid value for {key}: {message}"),
        }
    }
}

impl Error for ConfigError {}

/// Where finished turns are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Memory,
    Sqlite { path: PathBuf },
}

impl StoreConfig {
    pub fn backend_config(&self) -> BackendConfig {
        match self {
            Self::Memory => BackendConfig::Volatile,
            Self::Sqlite { path } => BackendConfig::Sqlite { path: path.clone() },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub openai_api_key: SecretString,
    pub openai_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub registry_url: String,
    pub session_id: String,
    pub max_steps: u32,
    pub store: StoreConfig,
    pub stream: bool,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let openai_api_key = non_empty("OPENAI_API_KEY")
            .map(|value| SecretString::new(value.trim()))
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let openai_base_url =
            non_empty("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        let model = non_empty("MDAGENT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let registry_url =
            non_empty("MDAGENT_REGISTRY_URL").unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string());
        let session_id =
            non_empty("MDAGENT_SESSION_ID").unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());

        let temperature = non_empty("MDAGENT_TEMPERATURE")
            .map(|value| parse_temperature(&value))
            .transpose()?
            .unwrap_or(DEFAULT_TEMPERATURE);

        let max_steps = non_empty("MDAGENT_MAX_STEPS")
            .map(|value| {
                value
                    .trim()
                    .parse::<u32>()
                    .map_err(|err| ConfigError::invalid_value("MDAGENT_MAX_STEPS", err.to_string()))
                    .and_then(|steps| match steps {
                        0 => Err(ConfigError::invalid_value(
                            "MDAGENT_MAX_STEPS",
                            "must be at least 1",
                        )),
                        steps => Ok(steps),
                    })
            })
            .transpose()?
            .unwrap_or(DEFAULT_MAX_STEPS);

        let store = match non_empty("MDAGENT_STORE")
            .map(|value| value.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("memory") => StoreConfig::Memory,
            Some("sqlite") => StoreConfig::Sqlite {
                path: non_empty("MDAGENT_SQLITE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SQLITE_PATH)),
            },
            Some(other) => {
                return Err(ConfigError::invalid_value(
                    "MDAGENT_STORE",
                    format!("expected 'memory' or 'sqlite', got '{other}'"),
                ));
            }
        };

        let stream = non_empty("MDAGENT_STREAM")
            .map(|value| parse_bool("MDAGENT_STREAM", &value))
            .transpose()?
            .unwrap_or(false);

        Ok(Self {
            openai_api_key,
            openai_base_url,
            model,
            temperature,
            registry_url,
            session_id,
            max_steps,
            store,
            stream,
        })
    }
}

fn parse_temperature(value: &str) -> Result<f32, ConfigError> {
    let temperature = value
        .trim()
        .parse::<f32>()
        .map_err(|err| ConfigError::invalid_value("MDAGENT_TEMPERATURE", err.to_string()))?;

    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigError::invalid_value(
            "MDAGENT_TEMPERATURE",
            "must be between 0 and 2",
        ));
    }

    Ok(temperature)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid_value(
            key,
            format!("expected a boolean, got '{other}'"),
        )),
    }
}
