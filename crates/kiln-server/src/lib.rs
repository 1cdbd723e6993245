//! # kiln-server
//!
//! HTTP front end for the kiln execution engine.
//!
//! ## Usage
//!
//! ```bash
//! # Serve on 0.0.0.0:8080 against the local Docker daemon
//! cargo run -p kiln-server
//!
//! # Run a program
//! curl -X POST http://localhost:8080/api/execute \
//!   -H "Content-Type: application/json" \
//!   -d '{"language":"python","code":"print(\"hi\")"}'
//! ```
//!
//! See [`ServerConfig::from_env`] for the environment variables.

pub mod config;
pub mod http;
pub mod types;

pub use config::{ConfigError, ServerConfig, MAX_INPUT_SIZE_BYTES};
pub use http::{build_router, serve, AppState};
