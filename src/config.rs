//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default source tag attached to submitted leads.
pub const DEFAULT_SOURCE: &str = "chatbot";

/// Dialogue engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pause before a bot message step advances on its own.
    pub typing_delay: Duration,
    /// Identifies which dialogue variant produced the lead.
    pub source: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            typing_delay: Duration::from_millis(800),
            source: DEFAULT_SOURCE.to_string(),
        }
    }
}

/// Service configuration, loaded from `LEAD_INTAKE_*` environment variables.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub port: u16,
    pub engine: EngineConfig,
    /// Persistence endpoint. `None` keeps leads in memory.
    pub lead_endpoint: Option<String>,
    pub lead_token: Option<SecretString>,
    /// Tracking endpoint. `None` discards analytics events.
    pub tracking_endpoint: Option<String>,
    /// Events buffered before a batch is delivered.
    pub tracking_batch_size: usize,
    pub http_timeout: Duration,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            engine: EngineConfig::default(),
            lead_endpoint: None,
            lead_token: None,
            tracking_endpoint: None,
            tracking_batch_size: 10,
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl IntakeConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = parse_or(&get, "LEAD_INTAKE_PORT", defaults.port)?;
        let typing_delay_ms = parse_or(
            &get,
            "LEAD_INTAKE_TYPING_DELAY_MS",
            defaults.engine.typing_delay.as_millis() as u64,
        )?;
        let tracking_batch_size =
            parse_or(&get, "LEAD_INTAKE_TRACKING_BATCH", defaults.tracking_batch_size)?;
        if tracking_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LEAD_INTAKE_TRACKING_BATCH".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let timeout_secs = parse_or(
            &get,
            "LEAD_INTAKE_HTTP_TIMEOUT_SECS",
            defaults.http_timeout.as_secs(),
        )?;

        Ok(Self {
            port,
            engine: EngineConfig {
                typing_delay: Duration::from_millis(typing_delay_ms),
                source: get("LEAD_INTAKE_SOURCE").unwrap_or(defaults.engine.source),
            },
            lead_endpoint: get("LEAD_INTAKE_LEAD_ENDPOINT"),
            lead_token: get("LEAD_INTAKE_LEAD_TOKEN").map(SecretString::from),
            tracking_endpoint: get("LEAD_INTAKE_TRACKING_ENDPOINT"),
            tracking_batch_size,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}
