//! Sandbox type - one ephemeral container bound to a single execution.

use crate::error::{CoreError, Result};
use crate::language::LanguageProfile;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use kiln_container::{
    Attached, ContainerConfig, ContainerError, ContainerId, ContainerRuntime, WORKING_DIR,
};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Unique identifier for a sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SandboxId(Uuid);

impl SandboxId {
    /// Create a new random sandbox ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SandboxId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SandboxId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Lifecycle state of a sandbox.
///
/// ```text
/// Created ──▶ Started ──▶ Running ──▶ Completed
///    │           │           └──────▶ Killed
///    └───────────┴──────────────────▶ CrashedAtSetup
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    /// Container exists and is configured, source not yet started.
    Created,
    /// Start call accepted by the runtime.
    Started,
    /// Output is being collected under the deadline.
    Running,
    /// Process exited on its own.
    Completed,
    /// Process was killed at its deadline.
    Killed,
    /// Setup failed before the process ran.
    CrashedAtSetup,
}

impl SandboxState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Killed | Self::CrashedAtSetup)
    }
}

impl fmt::Display for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Started => write!(f, "Started"),
            Self::Running => write!(f, "Running"),
            Self::Completed => write!(f, "Completed"),
            Self::Killed => write!(f, "Killed"),
            Self::CrashedAtSetup => write!(f, "CrashedAtSetup"),
        }
    }
}

/// One ephemeral container, used for exactly one execution.
///
/// A sandbox is created configured but not started. The caller injects the
/// source archive, attaches to the output channel, starts it, and finally
/// hands it to [`destroy`](Self::destroy), which consumes it. A sandbox that
/// is dropped without being destroyed schedules its own removal.
pub struct Sandbox {
    id: SandboxId,
    name: String,
    container: ContainerId,
    runtime: Arc<dyn ContainerRuntime>,
    profile: &'static LanguageProfile,
    state: SandboxState,
    created_at: DateTime<Utc>,
    exit: Option<JoinHandle<kiln_container::Result<i64>>>,
    armed: bool,
}

impl Sandbox {
    /// Create a container for `profile` (called by the executor).
    ///
    /// The image must already be present. The exit watcher is registered
    /// here, before the container can possibly run, so the exit code is
    /// observed even though the runtime removes the container on exit.
    pub(crate) async fn create(
        runtime: Arc<dyn ContainerRuntime>,
        name_prefix: &str,
        profile: &'static LanguageProfile,
        stdin: bool,
    ) -> Result<Self> {
        let id = SandboxId::new();
        let name = format!("{name_prefix}-{id}");
        tracing::debug!(
            sandbox_id = %id,
            language = profile.id,
            image = profile.image,
            stdin,
            "Creating sandbox"
        );

        let config = ContainerConfig::builder()
            .image(profile.image)
            .command(profile.command.iter().copied())
            .stdin(stdin)
            .build()?;

        let container = runtime.create(&name, &config).await?;
        let exit = tokio::spawn(runtime.exit_status(&container));

        tracing::debug!(
            sandbox_id = %id,
            container = container.short(),
            "Sandbox created"
        );

        Ok(Self {
            id,
            name,
            container,
            runtime,
            profile,
            state: SandboxState::Created,
            created_at: Utc::now(),
            exit: Some(exit),
            armed: true,
        })
    }

    /// Get the sandbox ID.
    pub fn id(&self) -> SandboxId {
        self.id
    }

    /// Container name as registered with the runtime.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runtime-assigned container id.
    pub fn container_id(&self) -> &ContainerId {
        &self.container
    }

    /// Get the current state.
    pub fn state(&self) -> SandboxState {
        self.state
    }

    /// Get the creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Profile this sandbox runs.
    pub fn profile(&self) -> &'static LanguageProfile {
        self.profile
    }

    /// Copy the source archive into the working directory.
    pub async fn inject(&self, archive: Bytes) -> Result<()> {
        self.ensure_state(SandboxState::Created)?;
        tracing::trace!(
            sandbox_id = %self.id,
            bytes = archive.len(),
            path = WORKING_DIR,
            "Injecting source archive"
        );
        self.runtime
            .upload_archive(&self.container, WORKING_DIR, archive)
            .await?;
        Ok(())
    }

    /// Attach to the output channel (and stdin, if requested).
    ///
    /// Done before [`start`](Self::start) so no early output is missed.
    pub async fn attach(&self, stdin: bool) -> Result<Attached> {
        self.ensure_state(SandboxState::Created)?;
        tracing::trace!(sandbox_id = %self.id, stdin, "Attaching to sandbox");
        Ok(self.runtime.attach(&self.container, stdin).await?)
    }

    /// Start the container process.
    pub async fn start(&mut self) -> Result<()> {
        self.ensure_state(SandboxState::Created)?;
        self.runtime.start(&self.container).await?;
        self.state = SandboxState::Started;
        tracing::debug!(sandbox_id = %self.id, "Sandbox started");
        Ok(())
    }

    /// Mark the start of output collection.
    pub(crate) fn mark_running(&mut self) {
        if self.state == SandboxState::Started {
            self.state = SandboxState::Running;
        }
    }

    /// Mark a failure that happened before the process ran.
    pub(crate) fn mark_crashed(&mut self) {
        if !self.state.is_terminal() {
            self.state = SandboxState::CrashedAtSetup;
        }
    }

    /// Wait for the process to exit and return its exit code.
    pub async fn wait_exit(&mut self) -> Result<i64> {
        self.ensure_state(SandboxState::Running)?;
        let handle = self.exit.take().ok_or_else(|| CoreError::InvalidState {
            expected: "exit watcher".into(),
            actual: "none".into(),
        })?;

        let code = match handle.await {
            Ok(result) => result?,
            Err(e) => {
                return Err(ContainerError::WaitFailed {
                    id: self.container.to_string(),
                    reason: e.to_string(),
                }
                .into())
            }
        };

        self.state = SandboxState::Completed;
        tracing::debug!(sandbox_id = %self.id, exit_code = code, "Sandbox exited");
        Ok(code)
    }

    /// Kill the process at its deadline.
    ///
    /// The state becomes `Killed` even if the kill request fails; removal
    /// still follows in [`destroy`](Self::destroy).
    pub async fn kill(&mut self) -> Result<()> {
        tracing::warn!(
            sandbox_id = %self.id,
            timeout_ms = self.profile.timeout.as_millis() as u64,
            "Deadline expired, killing sandbox"
        );
        self.state = SandboxState::Killed;
        if let Some(exit) = self.exit.take() {
            exit.abort();
        }
        self.runtime.kill(&self.container).await?;
        Ok(())
    }

    /// Remove the container.
    ///
    /// Consumes the sandbox, so removal is requested exactly once.
    pub async fn destroy(mut self) -> Result<()> {
        let start = std::time::Instant::now();
        tracing::debug!(sandbox_id = %self.id, state = %self.state, "Destroying sandbox");

        if let Some(exit) = self.exit.take() {
            exit.abort();
        }
        let result = self.runtime.remove(&self.container).await;
        self.armed = false;

        match result {
            Ok(()) => {
                tracing::debug!(
                    sandbox_id = %self.id,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Sandbox destroyed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(sandbox_id = %self.id, error = %e, "Failed to remove sandbox");
                Err(e.into())
            }
        }
    }

    fn ensure_state(&self, expected: SandboxState) -> Result<()> {
        if self.state != expected {
            return Err(CoreError::InvalidState {
                expected: expected.to_string(),
                actual: self.state.to_string(),
            });
        }
        Ok(())
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if let Some(exit) = self.exit.take() {
            exit.abort();
        }
        if !self.armed {
            return;
        }

        // Dropped mid-execution (the request future was cancelled)
        tracing::warn!(sandbox_id = %self.id, "Sandbox dropped without destroy, removing in background");
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!(sandbox_id = %self.id, "No runtime available, sandbox may leak");
            return;
        };
        let runtime = Arc::clone(&self.runtime);
        let container = self.container.clone();
        handle.spawn(async move {
            if let Err(e) = runtime.remove(&container).await {
                tracing::error!(container = %container, error = %e, "Background removal failed");
            }
        });
    }
}

impl fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("container", &self.container)
            .field("language", &self.profile.id)
            .field("state", &self.state)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
