//! Sandbox container configuration.
//!
//! Only the image, the command and whether stdin is wired up vary between
//! sandboxes. Isolation settings are fixed constants applied to every
//! container and cannot be overridden by callers.

use crate::error::{ContainerError, Result};

/// Directory the source archive is extracted into and the process starts in.
pub const WORKING_DIR: &str = "/app";

/// Unprivileged user the sandboxed process runs as.
pub const SANDBOX_USER: &str = "nobody";

/// Hard memory ceiling (128 MiB).
pub const MEMORY_LIMIT_BYTES: i64 = 128 * 1024 * 1024;

/// Relative CPU share weight.
pub const CPU_SHARES: i64 = 512;

/// Network mode; `none` leaves the container with loopback only.
pub const NETWORK_MODE: &str = "none";

/// Mount point of the writable scratch tmpfs.
pub const SCRATCH_MOUNT: &str = "/tmp";

/// Mount options of the scratch tmpfs: writable, non-executable, size-capped.
pub const SCRATCH_OPTIONS: &str = "rw,noexec,nosuid,size=100m";

/// Configuration for one sandbox container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Runtime image reference, e.g. `python:3.11-alpine`.
    pub image: String,
    /// Entry command as argv.
    pub command: Vec<String>,
    /// Attach and open stdin for a single write.
    pub stdin: bool,
}

impl ContainerConfig {
    /// Create a new config builder.
    pub fn builder() -> ContainerConfigBuilder {
        ContainerConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(ContainerError::CreateFailed {
                name: String::new(),
                reason: "image is required".into(),
            });
        }
        if self.command.is_empty() || self.command.iter().any(|arg| arg.is_empty()) {
            return Err(ContainerError::CreateFailed {
                name: String::new(),
                reason: "command must be a non-empty argv".into(),
            });
        }
        Ok(())
    }
}

/// Builder for [`ContainerConfig`].
#[derive(Debug, Default)]
pub struct ContainerConfigBuilder {
    image: String,
    command: Vec<String>,
    stdin: bool,
}

impl ContainerConfigBuilder {
    /// Set the image reference.
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Set the entry command.
    pub fn command<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = argv.into_iter().map(Into::into).collect();
        self
    }

    /// Wire up stdin for one-shot input.
    pub fn stdin(mut self, enabled: bool) -> Self {
        self.stdin = enabled;
        self
    }

    /// Build the configuration, validating all required fields.
    pub fn build(self) -> Result<ContainerConfig> {
        let config = ContainerConfig {
            image: self.image,
            command: self.command,
            stdin: self.stdin,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_success() {
        let config = ContainerConfig::builder()
            .image("python:3.11-alpine")
            .command(["python", "/app/main.py"])
            .stdin(true)
            .build()
            .expect("should build successfully");

        assert_eq!(config.image, "python:3.11-alpine");
        assert_eq!(config.command, vec!["python", "/app/main.py"]);
        assert!(config.stdin);
    }

    #[test]
    fn test_builder_stdin_defaults_off() {
        let config = ContainerConfig::builder()
            .image("node:18-alpine")
            .command(["node", "/app/main.js"])
            .build()
            .unwrap();
        assert!(!config.stdin);
    }

    #[test]
    fn test_builder_missing_image() {
        let result = ContainerConfig::builder().command(["true"]).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_missing_command() {
        let result = ContainerConfig::builder().image("gcc:alpine").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_limits() {
        assert_eq!(MEMORY_LIMIT_BYTES, 134_217_728);
        assert_eq!(CPU_SHARES, 512);
        assert_eq!(SCRATCH_OPTIONS, "rw,noexec,nosuid,size=100m");
    }
}
