//! Server Configuration
//!
//! Bind address and HTTP-layer settings for the FlowCloser server.

use serde::{Deserialize, Serialize};

use super::settings::DEFAULT_BACKEND_TIMEOUT_SECS;

/// Headroom above a primary plus fallback attempt
pub const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 30;

/// HTTP request bound that outlasts both sequential backend attempts
pub fn request_timeout_for(backend_timeout_secs: u64) -> u64 {
    backend_timeout_secs
        .saturating_mul(2)
        .saturating_add(REQUEST_TIMEOUT_MARGIN_SECS)
}

/// Server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration through a variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            enable_cors: lookup("FLOWCLOSER_ENABLE_CORS")
                .map(|v| v != "false")
                .unwrap_or(defaults.enable_cors),
            request_timeout_secs: lookup("FLOWCLOSER_REQUEST_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Apply CLI overrides
    pub fn with_cli(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err(format!("Invalid port: {}", self.port));
        }
        if self.host.trim().is_empty() {
            return Err("Host must not be empty".to_string());
        }
        Ok(())
    }

    /// Get bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8042,
            enable_cors: true,
            request_timeout_secs: request_timeout_for(DEFAULT_BACKEND_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8042);
        assert!(config.enable_cors);
    }

    #[test]
    fn test_bind_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_lookup_and_cli_overrides() {
        let config = ServerConfig::from_lookup(|key| match key {
            "PORT" => Some("9000".to_string()),
            "FLOWCLOSER_ENABLE_CORS" => Some("false".to_string()),
            _ => None,
        });
        assert_eq!(config.port, 9000);
        assert!(!config.enable_cors);

        let config = config.with_cli(Some("localhost".to_string()), None);
        assert_eq!(config.bind_addr(), "localhost:9000");
    }

    #[test]
    fn test_default_request_timeout_outlasts_both_attempts() {
        let config = ServerConfig::default();
        assert_eq!(config.request_timeout_secs, 150);
        assert!(config.request_timeout_secs > 2 * DEFAULT_BACKEND_TIMEOUT_SECS);
        assert_eq!(request_timeout_for(10), 50);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
