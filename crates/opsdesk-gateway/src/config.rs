//! Gateway configuration

use opsdesk_core::config::{ConfigError, RetryConfig};
use serde::{Deserialize, Serialize};

/// Settings for a [`QueryGateway`](crate::QueryGateway).
///
/// ```rust
/// use opsdesk_gateway::GatewayConfig;
///
/// let config: GatewayConfig = serde_json::from_str(
///     r#"{ "retry": { "max_attempts": 5 }, "max_connections": 16 }"#,
/// )
/// .unwrap();
///
/// assert_eq!(config.retry.max_attempts, 5);
/// assert!(config.idempotent_mutations_only);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Retry settings shared by every call
    pub retry: RetryConfig,

    /// Retry only mutations marked idempotent; others get a single attempt
    pub idempotent_mutations_only: bool,

    /// Cap on concurrent backend calls; `None` means unbounded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            idempotent_mutations_only: true,
            max_connections: None,
        }
    }
}

impl GatewayConfig {
    /// Check the settings against their allowed ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;

        if self.max_connections == Some(0) {
            return Err(ConfigError::OutOfRange(
                "max_connections must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from environment variables.
    ///
    /// Retry settings come from [`RetryConfig::from_env`]. In addition:
    /// - `OPSDESK_GATEWAY_IDEMPOTENT_MUTATIONS_ONLY` (`true`/`false`)
    /// - `OPSDESK_GATEWAY_MAX_CONNECTIONS`
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self {
            retry: RetryConfig::from_env()?,
            ..Self::default()
        };

        if let Some(only) = read_env("OPSDESK_GATEWAY_IDEMPOTENT_MUTATIONS_ONLY")? {
            config.idempotent_mutations_only = only;
        }

        if let Some(max_connections) = read_env("OPSDESK_GATEWAY_MAX_CONNECTIONS")? {
            config.max_connections = Some(max_connections);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "env")]
fn read_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };

    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        })
}
