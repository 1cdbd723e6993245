//! Executor configuration types.

use crate::error::CoreError;

/// Default cap on captured stdout and on captured stderr (1 MiB each).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Default number of sandboxes allowed to exist at once.
pub const DEFAULT_MAX_CONCURRENT_SANDBOXES: usize = 16;

/// Configuration for an [`Executor`](crate::Executor).
///
/// Isolation limits are deliberately absent: they are fixed per sandbox and
/// cannot be tuned here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum bytes kept per output stream.
    pub max_output_bytes: usize,
    /// Maximum sandboxes alive at once (0 = unbounded).
    pub max_concurrent_sandboxes: usize,
    /// Prefix of generated container names.
    pub name_prefix: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_concurrent_sandboxes: DEFAULT_MAX_CONCURRENT_SANDBOXES,
            name_prefix: "kiln".to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Create a new config builder.
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_output_bytes == 0 {
            return Err(CoreError::Config("max_output_bytes must be > 0".into()));
        }
        if self.name_prefix.is_empty() {
            return Err(CoreError::Config("name_prefix is required".into()));
        }
        // Docker names: [a-zA-Z0-9][a-zA-Z0-9_.-]*
        let mut chars = self.name_prefix.chars();
        let valid_first = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if !valid_first || !valid_rest {
            return Err(CoreError::Config(format!(
                "name_prefix {:?} is not a valid container name prefix",
                self.name_prefix
            )));
        }
        Ok(())
    }
}

/// Builder for ExecutorConfig.
#[derive(Debug, Default)]
pub struct ExecutorConfigBuilder {
    config: ExecutorConfig,
}

impl ExecutorConfigBuilder {
    /// Set the per-stream output cap in bytes.
    pub fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.config.max_output_bytes = bytes;
        self
    }

    /// Set the maximum number of live sandboxes (0 = unbounded).
    pub fn max_concurrent_sandboxes(mut self, count: usize) -> Self {
        self.config.max_concurrent_sandboxes = count;
        self
    }

    /// Set the container name prefix.
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.name_prefix = prefix.into();
        self
    }

    /// Build the configuration, validating all fields.
    pub fn build(self) -> Result<ExecutorConfig, CoreError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.max_output_bytes, 1024 * 1024);
        assert_eq!(config.max_concurrent_sandboxes, 16);
        assert_eq!(config.name_prefix, "kiln");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_success() {
        let config = ExecutorConfig::builder()
            .max_output_bytes(4096)
            .max_concurrent_sandboxes(0)
            .name_prefix("kiln-test")
            .build()
            .expect("should build successfully");

        assert_eq!(config.max_output_bytes, 4096);
        assert_eq!(config.max_concurrent_sandboxes, 0);
        assert_eq!(config.name_prefix, "kiln-test");
    }

    #[test]
    fn test_builder_zero_output_cap() {
        assert!(ExecutorConfig::builder().max_output_bytes(0).build().is_err());
    }

    #[test]
    fn test_builder_invalid_prefix() {
        assert!(ExecutorConfig::builder().name_prefix("").build().is_err());
        assert!(ExecutorConfig::builder().name_prefix("-kiln").build().is_err());
        assert!(ExecutorConfig::builder().name_prefix("ki ln").build().is_err());
    }
}
