//! # kiln-core
//!
//! Execution engine for the kiln sandboxed code runner.
//!
//! Each request runs in its own short-lived container: the source is packed
//! into a tar archive, injected into a freshly created sandbox, and executed
//! under a per-language deadline. Every outcome, including infrastructure
//! failures, comes back as an [`ExecutionResult`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    kiln-core (host)                      │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌─────────────────┐     ┌──────────────────────────┐   │
//! │  │    Executor     │────▶│  Language registry       │   │
//! │  │  - execute()    │     │  ImageProvisioner        │   │
//! │  │  - health()     │     └──────────────────────────┘   │
//! │  └─────────────────┘                                    │
//! │           │                                              │
//! │           ▼                                              │
//! │  ┌─────────────────┐     ┌──────────────────────────┐   │
//! │  │    Sandbox      │────▶│  ContainerRuntime        │   │
//! │  │  - inject()     │     │  (from kiln-container)   │   │
//! │  │  - start()      │     └──────────────────────────┘   │
//! │  │  - destroy()    │                │                   │
//! │  └─────────────────┘                ▼                   │
//! │           │              ┌──────────────────────────┐   │
//! │  ┌─────────────────┐     │  Docker Engine API       │   │
//! │  │ collect() under │     └──────────────────────────┘   │
//! │  │ race_deadline() │                                    │
//! │  └─────────────────┘                                    │
//! │                                                          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use kiln_core::{ExecutionRequest, Executor, ExecutorConfig};
//!
//! # async fn example() -> kiln_core::Result<()> {
//! let executor = Executor::docker(ExecutorConfig::default())?;
//!
//! let result = executor
//!     .execute(ExecutionRequest::new("python", "print(input())").with_stdin("hello"))
//!     .await;
//! println!("{} (exit {})", result.output, result.exit_code);
//! # Ok(())
//! # }
//! ```
//!
//! ## Languages
//!
//! | id | image | timeout |
//! |----|-------|---------|
//! | `python` | `python:3.11-alpine` | 10 s |
//! | `java` | `openjdk:17-alpine` | 15 s |
//! | `cpp` | `gcc:alpine` | 15 s |
//! | `c` | `gcc:alpine` | 15 s |
//! | `javascript` | `node:18-alpine` | 10 s |

mod archive;
mod collector;
mod config;
mod error;
mod executor;
mod language;
mod provision;
mod result;
mod sandbox;
mod supervisor;

#[cfg(test)]
mod testing;

pub use archive::{build_archive, ArchiveError};
pub use collector::{collect, Collected, TRUNCATION_MARKER};
pub use config::{
    ExecutorConfig, ExecutorConfigBuilder, DEFAULT_MAX_CONCURRENT_SANDBOXES,
    DEFAULT_MAX_OUTPUT_BYTES,
};
pub use error::{CoreError, Result};
pub use executor::Executor;
pub use language::{Language, LanguageProfile};
pub use provision::ImageProvisioner;
pub use result::{ExecutionRequest, ExecutionResult, Outcome, FAILURE_EXIT_CODE, TIMEOUT_MESSAGE};
pub use sandbox::{Sandbox, SandboxId, SandboxState};
pub use supervisor::{race_deadline, Race};
