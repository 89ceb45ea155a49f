use std::time::Duration;

use concierge_core::dispatch::DEFAULT_DISPATCH_TIMEOUT;
use concierge_core::postprocess::DEFAULT_REDIRECT_SUFFIX;
use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_POOL_SIZE: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Server settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub pool_size: usize,
    pub api_key: String,
    pub agent_url: String,
    pub dispatch_timeout: Duration,
    pub redirect_suffix: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let port = parse_or(&lookup, "PORT", "a port number", DEFAULT_PORT)?;
        let pool_size = parse_or(
            &lookup,
            "CONCIERGE_POOL_SIZE",
            "a positive integer",
            DEFAULT_POOL_SIZE,
        )?;
        if pool_size == 0 {
            return Err(ConfigError::Invalid {
                name: "CONCIERGE_POOL_SIZE",
                expected: "a positive integer",
                value: "0".to_string(),
            });
        }
        let timeout_secs = parse_or(
            &lookup,
            "CONCIERGE_DISPATCH_TIMEOUT_SECS",
            "a number of seconds",
            DEFAULT_DISPATCH_TIMEOUT.as_secs(),
        )?;

        Ok(Self {
            port,
            pool_size,
            api_key: required("CONCIERGE_API_KEY")?,
            agent_url: required("CONCIERGE_AGENT_URL")?,
            dispatch_timeout: Duration::from_secs(timeout_secs),
            redirect_suffix: lookup("CONCIERGE_REDIRECT_SUFFIX")
                .unwrap_or_else(|| DEFAULT_REDIRECT_SUFFIX.to_string()),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value: raw,
        }),
    }
}
