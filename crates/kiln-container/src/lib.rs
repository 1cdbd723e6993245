//! # kiln-container
//!
//! Ephemeral sandbox containers for the kiln execution service.
//! Provides a narrow runtime abstraction and its Docker implementation.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kiln_container::{ContainerConfig, ContainerRuntime, DockerRuntime};
//!
//! # async fn example() -> kiln_container::Result<()> {
//! let runtime = DockerRuntime::connect()?;
//! runtime.ping().await?;
//!
//! let config = ContainerConfig::builder()
//!     .image("python:3.11-alpine")
//!     .command(["python", "/app/main.py"])
//!     .build()?;
//!
//! let id = runtime.create("kiln-example", &config).await?;
//! runtime.remove(&id).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Isolation
//!
//! Every container is created with the same fixed limits, regardless of the
//! caller:
//!
//! - **Memory**: 128 MiB hard ceiling
//! - **CPU**: share weight 512
//! - **Network**: disabled (`none`)
//! - **Scratch**: `/tmp` tmpfs, `rw,noexec,nosuid,size=100m`
//! - **User**: `nobody`
//! - **Lifetime**: auto-removed on exit

mod config;
mod docker;
mod error;
mod runtime;

pub use config::{
    ContainerConfig, ContainerConfigBuilder, CPU_SHARES, MEMORY_LIMIT_BYTES, NETWORK_MODE,
    SANDBOX_USER, SCRATCH_MOUNT, SCRATCH_OPTIONS, WORKING_DIR,
};
pub use docker::DockerRuntime;
pub use error::{ContainerError, Result};
pub use runtime::{
    Attached, ContainerId, ContainerRuntime, ExitFuture, FrameStream, InputSink, OutputFrame,
};
