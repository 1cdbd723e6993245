//! The container runtime abstraction the sandbox layer is written against.

use crate::config::ContainerConfig;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::fmt;
use std::pin::Pin;
use tokio::io::AsyncWrite;

/// Runtime-assigned identifier of a created container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(String);

impl ContainerId {
    /// Wrap a runtime-assigned id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for logs.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        self.0.get(..end).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One demultiplexed chunk of the container's combined output channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFrame {
    /// Bytes written to stdout
    Stdout(Bytes),
    /// Bytes written to stderr
    Stderr(Bytes),
    /// Echoed stdin or raw console bytes
    Other(Bytes),
}

/// Stream of output frames, ended by end-of-stream.
pub type FrameStream = BoxStream<'static, Result<OutputFrame>>;

/// Write side of the container's stdin.
pub type InputSink = Pin<Box<dyn AsyncWrite + Send>>;

/// Future resolving to the container's exit code.
pub type ExitFuture = BoxFuture<'static, Result<i64>>;

/// Both ends of an attach session.
pub struct Attached {
    /// Demultiplexed stdout/stderr frames.
    pub output: FrameStream,
    /// Stdin writer; a no-op sink when stdin was not requested.
    pub input: InputSink,
}

impl fmt::Debug for Attached {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attached").finish_non_exhaustive()
    }
}

/// Operations kiln needs from a container runtime.
///
/// Every method operates on a single container and implementations must be
/// safe to share between concurrent requests without locking.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Check that the runtime daemon answers.
    async fn ping(&self) -> Result<()>;

    /// Whether `image` is available locally.
    async fn image_present(&self, image: &str) -> Result<bool>;

    /// Pull `image` and wait for the pull to finish.
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// Create (but do not start) a container named `name`.
    async fn create(&self, name: &str, config: &ContainerConfig) -> Result<ContainerId>;

    /// Register interest in the container's next exit.
    ///
    /// Must be called before [`start`](Self::start) so that an auto-removed
    /// container cannot disappear before its status is read.
    fn exit_status(&self, id: &ContainerId) -> ExitFuture;

    /// Extract a tar archive into `path` inside the container.
    async fn upload_archive(&self, id: &ContainerId, path: &str, archive: Bytes) -> Result<()>;

    /// Attach to stdout/stderr and, if `stdin` is set, stdin.
    async fn attach(&self, id: &ContainerId, stdin: bool) -> Result<Attached>;

    /// Start the container process.
    async fn start(&self, id: &ContainerId) -> Result<()>;

    /// Send SIGKILL to the container.
    async fn kill(&self, id: &ContainerId) -> Result<()>;

    /// Force-remove the container. Removing a container that is already gone
    /// succeeds.
    async fn remove(&self, id: &ContainerId) -> Result<()>;

    /// Whether the container is still known to the runtime.
    async fn exists(&self, id: &ContainerId) -> Result<bool>;
}
