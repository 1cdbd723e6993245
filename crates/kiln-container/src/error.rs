//! Error types for kiln-container.

use thiserror::Error;

/// Result type alias for kiln-container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors that can occur while driving a sandbox container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Could not reach the container runtime
    #[error("failed to connect to container runtime: {0}")]
    Connect(String),

    /// Image pull did not complete
    #[error("failed to pull image {image}: {reason}")]
    PullFailed {
        /// Image reference that was being pulled
        image: String,
        /// Underlying failure
        reason: String,
    },

    /// Container creation was rejected
    #[error("failed to create container {name}: {reason}")]
    CreateFailed {
        /// Requested container name
        name: String,
        /// Underlying failure
        reason: String,
    },

    /// Archive injection failed
    #[error("failed to copy source into container {id}: {reason}")]
    UploadFailed {
        /// Container id
        id: String,
        /// Underlying failure
        reason: String,
    },

    /// Start call failed
    #[error("failed to start container {id}: {reason}")]
    StartFailed {
        /// Container id
        id: String,
        /// Underlying failure
        reason: String,
    },

    /// Attach call failed
    #[error("failed to attach to container {id}: {reason}")]
    AttachFailed {
        /// Container id
        id: String,
        /// Underlying failure
        reason: String,
    },

    /// The attached output stream broke mid-read
    #[error("output stream error: {0}")]
    Stream(String),

    /// Exit status could not be retrieved
    #[error("failed to read exit status of container {id}: {reason}")]
    WaitFailed {
        /// Container id
        id: String,
        /// Underlying failure
        reason: String,
    },

    /// Kill signal was not delivered
    #[error("failed to kill container {id}: {reason}")]
    KillFailed {
        /// Container id
        id: String,
        /// Underlying failure
        reason: String,
    },

    /// Container removal failed
    #[error("failed to remove container {id}: {reason}")]
    RemoveFailed {
        /// Container id
        id: String,
        /// Underlying failure
        reason: String,
    },

    /// Any other runtime API failure (inspect, ping)
    #[error("container runtime request failed: {0}")]
    Runtime(String),
}
