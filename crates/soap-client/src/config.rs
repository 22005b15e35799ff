//! Client configuration with validation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable enabling envelope dumps when set to a non-zero integer.
pub const DEBUG_ENV_VAR: &str = "SOAP_DEBUG";

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint URL every call is POSTed to
    pub endpoint: String,
    /// Namespace of the method elements; also the default SOAP action prefix
    pub message_namespace: String,
    /// Whole-request timeout applied by the HTTP transport
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Connection establishment timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Log every serialized envelope before it is sent
    pub debug_envelopes: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            message_namespace: String::new(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            debug_envelopes: false,
        }
    }
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, message_namespace: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            message_namespace: message_namespace.into(),
            ..Self::default()
        }
    }

    /// Overlay settings taken from the process environment.
    ///
    /// `SOAP_DEBUG` set to a non-zero integer turns on envelope dumps. The
    /// client also consults it on every call, so this only matters for
    /// pinning the value into a stored configuration.
    pub fn from_env(mut self) -> Self {
        if let Ok(raw) = std::env::var(DEBUG_ENV_VAR) {
            self.debug_envelopes = debug_flag(&raw);
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        if reqwest::Url::parse(&self.endpoint).is_err() {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        if self.message_namespace.is_empty() {
            return Err(ConfigError::MissingNamespace);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("timeout cannot be 0".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "connect_timeout cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

/// Whether `SOAP_DEBUG` currently asks for envelope dumps.
pub(crate) fn debug_from_env() -> bool {
    std::env::var(DEBUG_ENV_VAR).is_ok_and(|raw| debug_flag(&raw))
}

fn debug_flag(raw: &str) -> bool {
    raw.trim().parse::<i64>().is_ok_and(|v| v != 0)
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("endpoint is not set")]
    MissingEndpoint,
    #[error("endpoint is not a valid URL: {0}")]
    InvalidEndpoint(String),
    #[error("message namespace is not set")]
    MissingNamespace,
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}
