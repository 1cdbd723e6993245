//! Configuration for the HTTP server.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use kiln_core::{
    CoreError, ExecutorConfig, DEFAULT_MAX_CONCURRENT_SANDBOXES, DEFAULT_MAX_OUTPUT_BYTES,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

/// Maximum size for code and stdin input in bytes (10 MB).
pub const MAX_INPUT_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Configuration for the kiln server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// HTTP server bind address.
    pub http_addr: SocketAddr,

    /// Docker daemon socket; `None` uses the local defaults.
    pub docker_socket: Option<String>,

    /// Maximum sandboxes alive at once (0 = unbounded).
    pub max_concurrent: usize,

    /// Maximum size of `code` and of `input` in a request.
    pub max_input_bytes: usize,

    /// Maximum bytes kept per output stream.
    pub max_output_bytes: usize,
}

/// Configuration validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },

    #[error(transparent)]
    Executor(#[from] CoreError),
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 8080),
            docker_socket: None,
            max_concurrent: DEFAULT_MAX_CONCURRENT_SANDBOXES,
            max_input_bytes: MAX_INPUT_SIZE_BYTES,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `KILN_HTTP_HOST` | `0.0.0.0` |
    /// | `KILN_HTTP_PORT` | `8080` |
    /// | `KILN_DOCKER_SOCKET` | local Docker defaults |
    /// | `KILN_MAX_CONCURRENT` | `16` (0 = unbounded) |
    /// | `KILN_MAX_INPUT_BYTES` | `10485760` |
    /// | `KILN_MAX_OUTPUT_BYTES` | `1048576` |
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();

        let http_host: IpAddr =
            parse_var(&lookup, "KILN_HTTP_HOST").unwrap_or(default.http_addr.ip());
        let http_port: u16 =
            parse_var(&lookup, "KILN_HTTP_PORT").unwrap_or(default.http_addr.port());

        Self {
            http_addr: SocketAddr::new(http_host, http_port),
            docker_socket: lookup("KILN_DOCKER_SOCKET").filter(|v| !v.trim().is_empty()),
            max_concurrent: parse_var(&lookup, "KILN_MAX_CONCURRENT")
                .unwrap_or(default.max_concurrent),
            max_input_bytes: parse_var(&lookup, "KILN_MAX_INPUT_BYTES")
                .unwrap_or(default.max_input_bytes),
            max_output_bytes: parse_var(&lookup, "KILN_MAX_OUTPUT_BYTES")
                .unwrap_or(default.max_output_bytes),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_input_bytes == 0 {
            return Err(ConfigError::Zero {
                name: "max_input_bytes",
            });
        }
        self.executor_config()?;
        Ok(())
    }

    /// Executor settings derived from this configuration.
    pub fn executor_config(&self) -> Result<ExecutorConfig, ConfigError> {
        Ok(ExecutorConfig::builder()
            .max_concurrent_sandboxes(self.max_concurrent)
            .max_output_bytes(self.max_output_bytes)
            .build()?)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}
