use crate::{env_or_default, env_parse, ConfigError, Environment, FromEnv};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Grace period granted to in-flight requests when the server stops.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Upper bound on a single request's storage work.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Server configuration for HTTP APIs
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_grace_secs: u64,
    pub request_timeout_secs: u64,
    /// Framework mode, fixed at construction.
    pub mode: Environment,
}

impl ServerConfig {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            ..Self::default()
        }
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn with_mode(mut self, mode: Environment) -> Self {
        self.mode = mode;
        self
    }
}

impl FromEnv for ServerConfig {
    /// Reads from environment variables with sensible defaults:
    /// - HOST: defaults to Ipv4Addr::UNSPECIFIED (0.0.0.0 - all interfaces)
    /// - PORT: defaults to 8080
    /// - SHUTDOWN_GRACE_SECS: defaults to 5
    /// - REQUEST_TIMEOUT_SECS: defaults to 30
    /// - APP_ENV: server mode, defaults to development
    fn from_env() -> Result<Self, ConfigError> {
        let host = env_or_default("HOST", &Ipv4Addr::UNSPECIFIED.to_string());
        let port = env_parse("PORT", "8080")?;
        let shutdown_grace_secs = env_parse(
            "SHUTDOWN_GRACE_SECS",
            &DEFAULT_SHUTDOWN_GRACE_SECS.to_string(),
        )?;
        let request_timeout_secs = env_parse(
            "REQUEST_TIMEOUT_SECS",
            &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
        )?;

        Ok(Self {
            host,
            port,
            shutdown_grace_secs,
            request_timeout_secs,
            mode: Environment::from_env(),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED.to_string(),
            port: 8080,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            mode: Environment::Development,
        }
    }
}
