//! Server configuration module
//! Handles runtime parameters for the relay server

use crate::constants::{DEFAULT_HOST, DEFAULT_PORT};
use crate::error::{RelayError, Result};
use std::env;

/// Relay server configuration parameters
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
}

impl RelayConfig {
    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let host = env::var("NOOR_RELAY_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());

        let port = match env::var("NOOR_RELAY_PORT") {
            Ok(raw) => raw.parse().map_err(|_| {
                RelayError::ConfigError(format!("invalid NOOR_RELAY_PORT value: {}", raw))
            })?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self { host, port })
    }

    /// Address string the server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
