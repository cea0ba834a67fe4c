//! Configuration error types.
//!
//! Provider and aggregation failures live in `multitemp-weather`; this module
//! covers what can go wrong before a request is served.

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    /// Returns a short hint suitable for showing to an operator.
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration file not found. Check the --config path.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }

    /// Find a `ConfigError` anywhere in an `anyhow` chain.
    pub fn find(err: &anyhow::Error) -> Option<&ConfigError> {
        err.chain().find_map(|cause| cause.downcast_ref::<ConfigError>())
    }
}
