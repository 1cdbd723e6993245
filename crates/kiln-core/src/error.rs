//! Error types for kiln-core.

use crate::archive::ArchiveError;
use thiserror::Error;

/// Result type alias for kiln-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while executing a request.
///
/// These never cross [`Executor::execute`](crate::Executor::execute); they
/// are folded into an [`ExecutionResult`](crate::ExecutionResult) there.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Error from kiln-container
    #[error(transparent)]
    Container(#[from] kiln_container::ContainerError),

    /// Language id not in the registry
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Source could not be packed
    #[error("failed to build source archive: {0}")]
    Archive(#[from] ArchiveError),

    /// Invalid engine configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Invalid sandbox state for operation
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// The engine is shutting down and no longer admits sandboxes
    #[error("executor is shutting down")]
    ShuttingDown,
}
