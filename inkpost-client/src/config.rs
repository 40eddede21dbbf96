use crate::error::ClientError;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://blog-system-backend.onrender.com";

pub const ENV_API_URL: &str = "INKPOST_API_URL";
pub const ENV_TIMEOUT: &str = "INKPOST_TIMEOUT_SECS";
pub const ENV_CONNECT_TIMEOUT: &str = "INKPOST_CONNECT_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Reads the process environment. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TIMEOUT) {
            config.timeout = parse_secs(ENV_TIMEOUT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CONNECT_TIMEOUT) {
            config.connect_timeout = parse_secs(ENV_CONNECT_TIMEOUT, &raw)?;
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration, ClientError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ClientError::Config(format!("{key}={raw:?}: {e}")))
}
