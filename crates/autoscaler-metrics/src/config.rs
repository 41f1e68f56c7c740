//! Exposition endpoint configuration.
//!
//! Configuration is loaded from environment variables with sensible
//! defaults. The registry itself has no configuration surface; the only
//! knob is where the surrounding process binds the scrape listener, and the
//! binding itself stays with that process (it hands a bound listener to
//! [`serve`]).
//!
//! [`serve`]: crate::server::serve

use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use thiserror::Error;

/// Default scrape endpoint bind address.
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8085";

/// Exposition endpoint configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address the surrounding process binds the scrape listener to
    /// (default: "0.0.0.0:8085").
    pub bind_address: SocketAddr,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl MetricsConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `CA_METRICS_BIND_ADDRESS` is
    /// set but does not parse as a socket address.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the bind address does not
    /// parse as a socket address.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let raw = vars
            .get("CA_METRICS_BIND_ADDRESS")
            .map_or(DEFAULT_METRICS_BIND_ADDRESS, String::as_str);

        let bind_address = raw.parse().map_err(|e| {
            ConfigError::InvalidValue(format!("CA_METRICS_BIND_ADDRESS \"{raw}\": {e}"))
        })?;

        Ok(MetricsConfig { bind_address })
    }
}
