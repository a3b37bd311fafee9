//! Retry configuration loaded from files or the environment.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A setting could not be parsed.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Setting name (environment variable or field)
        key: String,
        /// The offending raw value
        value: String,
    },

    /// A setting parsed but is outside its allowed range.
    #[error("Out of range: {0}")]
    OutOfRange(String),
}

/// Serializable retry settings.
///
/// This is the plain-data form of a [`RetryPolicy`](crate::retry::RetryPolicy);
/// the retry predicate is code and therefore not part of it.
///
/// Missing fields fall back to the defaults:
///
/// ```rust
/// use opsdesk_core::config::RetryConfig;
///
/// let config: RetryConfig = serde_json::from_str(r#"{ "max_attempts": 5 }"#).unwrap();
/// assert_eq!(config.max_attempts, 5);
/// assert_eq!(config.initial_delay_ms, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound on any single delay, in milliseconds
    pub max_delay_ms: u64,

    /// Growth factor per attempt
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before the first retry.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Upper bound on any single delay.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Check the settings against their allowed ranges.
    ///
    /// `initial_delay_ms > max_delay_ms` is accepted: every delay is then
    /// clamped to `max_delay_ms`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::OutOfRange(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::OutOfRange(format!(
                "backoff_multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }

        Ok(())
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first, if present.
    /// This will look for:
    /// - `OPSDESK_RETRY_MAX_ATTEMPTS`
    /// - `OPSDESK_RETRY_INITIAL_DELAY_MS`
    /// - `OPSDESK_RETRY_MAX_DELAY_MS`
    /// - `OPSDESK_RETRY_BACKOFF_MULTIPLIER`
    ///
    /// Unset variables keep their defaults. Variables that are set but do
    /// not parse, or that fail [`validate`](Self::validate), are errors.
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is the common case.
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Some(max_attempts) = read_env("OPSDESK_RETRY_MAX_ATTEMPTS")? {
            config.max_attempts = max_attempts;
        }

        if let Some(initial_delay_ms) = read_env("OPSDESK_RETRY_INITIAL_DELAY_MS")? {
            config.initial_delay_ms = initial_delay_ms;
        }

        if let Some(max_delay_ms) = read_env("OPSDESK_RETRY_MAX_DELAY_MS")? {
            config.max_delay_ms = max_delay_ms;
        }

        if let Some(multiplier) = read_env("OPSDESK_RETRY_BACKOFF_MULTIPLIER")? {
            config.backoff_multiplier = multiplier;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "env")]
fn read_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}
