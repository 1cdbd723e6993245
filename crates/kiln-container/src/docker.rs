//! Docker-backed container runtime using bollard.

use crate::config::{
    ContainerConfig, CPU_SHARES, MEMORY_LIMIT_BYTES, NETWORK_MODE, SANDBOX_USER, SCRATCH_MOUNT,
    SCRATCH_OPTIONS, WORKING_DIR,
};
use crate::error::{ContainerError, Result};
use crate::runtime::{Attached, ContainerId, ContainerRuntime, ExitFuture, OutputFrame};
use async_trait::async_trait;
use bollard::container::{AttachContainerResults, LogOutput};
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    AttachContainerOptionsBuilder, CreateContainerOptionsBuilder, CreateImageOptionsBuilder,
    InspectContainerOptions, KillContainerOptionsBuilder, RemoveContainerOptionsBuilder,
    StartContainerOptions, UploadToContainerOptionsBuilder, WaitContainerOptionsBuilder,
};
use bollard::{Docker, API_DEFAULT_VERSION};
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use tracing::instrument;

/// Request timeout for socket connections; image pulls can be slow.
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Docker runtime for sandbox containers.
///
/// The bollard client is internally reference counted, so a single
/// `DockerRuntime` is shared by every request.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl std::fmt::Debug for DockerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerRuntime").finish_non_exhaustive()
    }
}

impl DockerRuntime {
    /// Connect using the platform defaults (`DOCKER_HOST` or the local socket).
    ///
    /// No request is made; use [`ContainerRuntime::ping`] to check reachability.
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| ContainerError::Connect(e.to_string()))?;
        tracing::debug!("Docker client configured from local defaults");
        Ok(Self { docker })
    }

    /// Connect to a Docker daemon listening on the given unix socket.
    pub fn connect_with_socket(path: &str) -> Result<Self> {
        let docker = Docker::connect_with_socket(path, DEFAULT_TIMEOUT_SECS, API_DEFAULT_VERSION)
            .map_err(|e| ContainerError::Connect(format!("{path}: {e}")))?;
        tracing::debug!(socket = %path, "Docker client configured");
        Ok(Self { docker })
    }

    /// Wrap a pre-configured bollard client.
    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }

    /// Block until an auto-removed container is fully gone.
    async fn await_removal(&self, id: &ContainerId) {
        let options = WaitContainerOptionsBuilder::new()
            .condition("removed")
            .build();
        let mut stream = self.docker.wait_container(id.as_str(), Some(options));
        if let Some(Err(e)) = stream.next().await {
            if !is_status(&e, 404) && !matches!(e, BollardError::DockerContainerWaitError { .. }) {
                tracing::debug!(container = %id.short(), error = %e, "wait for removal failed");
            }
        }
    }
}

/// Split an image reference into name and tag.
fn parse_image_ref(image: &str) -> (&str, &str) {
    if image.contains('@') {
        return (image, "");
    }

    // A ':' followed by a '/' is a registry port, not a tag
    if let Some((name, tag)) = image.rsplit_once(':') {
        if !tag.contains('/') {
            return (name, tag);
        }
    }

    (image, "latest")
}

/// Host configuration shared by every sandbox.
fn build_host_config() -> HostConfig {
    let tmpfs = HashMap::from([(SCRATCH_MOUNT.to_string(), SCRATCH_OPTIONS.to_string())]);

    HostConfig {
        auto_remove: Some(true),
        readonly_rootfs: Some(false),
        network_mode: Some(NETWORK_MODE.to_string()),
        tmpfs: Some(tmpfs),
        memory: Some(MEMORY_LIMIT_BYTES),
        cpu_shares: Some(CPU_SHARES),
        ..Default::default()
    }
}

/// Container create body for a sandbox.
fn build_create_body(config: &ContainerConfig) -> ContainerCreateBody {
    ContainerCreateBody {
        image: Some(config.image.clone()),
        cmd: Some(config.command.clone()),
        working_dir: Some(WORKING_DIR.to_string()),
        user: Some(SANDBOX_USER.to_string()),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        attach_stdin: Some(config.stdin),
        open_stdin: Some(config.stdin),
        stdin_once: Some(config.stdin),
        network_disabled: Some(true),
        host_config: Some(build_host_config()),
        ..Default::default()
    }
}

fn frame_from_log(output: LogOutput) -> OutputFrame {
    match output {
        LogOutput::StdOut { message } => OutputFrame::Stdout(message),
        LogOutput::StdErr { message } => OutputFrame::Stderr(message),
        LogOutput::StdIn { message } | LogOutput::Console { message } => {
            OutputFrame::Other(message)
        }
    }
}

fn is_status(error: &BollardError, status: u16) -> bool {
    matches!(
        error,
        BollardError::DockerResponseServerError { status_code, .. } if *status_code == status
    )
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| ContainerError::Runtime(format!("ping failed: {e}")))
    }

    #[instrument(skip(self), fields(otel.name = "image.inspect", container.image.name = %image))]
    async fn image_present(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(e) if is_status(&e, 404) => Ok(false),
            Err(e) => Err(ContainerError::Runtime(format!(
                "failed to inspect image {image}: {e}"
            ))),
        }
    }

    #[instrument(skip(self), fields(otel.name = "image.pull", container.image.name = %image))]
    async fn pull_image(&self, image: &str) -> Result<()> {
        let (name, tag) = parse_image_ref(image);
        tracing::info!(image = %image, name = %name, tag = %tag, "pulling image");

        let mut builder = CreateImageOptionsBuilder::new().from_image(name);
        if !tag.is_empty() {
            builder = builder.tag(tag);
        }

        let mut stream = self.docker.create_image(Some(builder.build()), None, None);
        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        tracing::trace!(status = %status, "pull progress");
                    }
                }
                Err(e) => {
                    return Err(ContainerError::PullFailed {
                        image: image.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(image = %image, "image pulled successfully");
        Ok(())
    }

    #[instrument(
        skip(self, config),
        fields(otel.name = "container.create", container.image.name = %config.image)
    )]
    async fn create(&self, name: &str, config: &ContainerConfig) -> Result<ContainerId> {
        config.validate()?;

        let options = CreateContainerOptionsBuilder::new().name(name).build();
        let response = self
            .docker
            .create_container(Some(options), build_create_body(config))
            .await
            .map_err(|e| ContainerError::CreateFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        for warning in &response.warnings {
            tracing::warn!(container = %name, warning = %warning, "create warning");
        }

        let id = ContainerId::new(response.id);
        tracing::debug!(container = %name, id = %id.short(), "container created");
        Ok(id)
    }

    fn exit_status(&self, id: &ContainerId) -> ExitFuture {
        let docker = self.docker.clone();
        let id = id.clone();

        Box::pin(async move {
            let options = WaitContainerOptionsBuilder::new()
                .condition("next-exit")
                .build();
            let mut stream = docker.wait_container(id.as_str(), Some(options));

            match stream.next().await {
                Some(Ok(response)) => Ok(response.status_code),
                // bollard reports a nonzero exit as an error carrying the code
                Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
                Some(Err(e)) => Err(ContainerError::WaitFailed {
                    id: id.to_string(),
                    reason: e.to_string(),
                }),
                None => Err(ContainerError::WaitFailed {
                    id: id.to_string(),
                    reason: "wait stream closed unexpectedly".into(),
                }),
            }
        })
    }

    #[instrument(
        skip(self, archive),
        fields(otel.name = "container.upload", container.id = %id.short(), bytes = archive.len())
    )]
    async fn upload_archive(&self, id: &ContainerId, path: &str, archive: Bytes) -> Result<()> {
        let options = UploadToContainerOptionsBuilder::new().path(path).build();

        self.docker
            .upload_to_container(id.as_str(), Some(options), bollard::body_full(archive))
            .await
            .map_err(|e| ContainerError::UploadFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }

    #[instrument(skip(self), fields(otel.name = "container.attach", container.id = %id.short()))]
    async fn attach(&self, id: &ContainerId, stdin: bool) -> Result<Attached> {
        let options = AttachContainerOptionsBuilder::new()
            .stream(true)
            .stdout(true)
            .stderr(true)
            .stdin(stdin)
            .build();

        let AttachContainerResults { output, input } = self
            .docker
            .attach_container(id.as_str(), Some(options))
            .await
            .map_err(|e| ContainerError::AttachFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        let output = output
            .map(|item| {
                item.map(frame_from_log)
                    .map_err(|e| ContainerError::Stream(e.to_string()))
            })
            .boxed();

        Ok(Attached { output, input })
    }

    #[instrument(skip(self), fields(otel.name = "container.start", container.id = %id.short()))]
    async fn start(&self, id: &ContainerId) -> Result<()> {
        self.docker
            .start_container(id.as_str(), None::<StartContainerOptions>)
            .await
            .map_err(|e| ContainerError::StartFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }

    #[instrument(skip(self), fields(otel.name = "container.kill", container.id = %id.short()))]
    async fn kill(&self, id: &ContainerId) -> Result<()> {
        let options = KillContainerOptionsBuilder::new().signal("SIGKILL").build();

        match self.docker.kill_container(id.as_str(), Some(options)).await {
            Ok(()) => Ok(()),
            // Already exited or already removed
            Err(e) if is_status(&e, 404) || is_status(&e, 409) => {
                tracing::debug!(container = %id.short(), error = %e, "kill skipped");
                Ok(())
            }
            Err(e) => Err(ContainerError::KillFailed {
                id: id.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    #[instrument(skip(self), fields(otel.name = "container.remove", container.id = %id.short()))]
    async fn remove(&self, id: &ContainerId) -> Result<()> {
        let options = RemoveContainerOptionsBuilder::new()
            .force(true)
            .v(true)
            .build();

        match self.docker.remove_container(id.as_str(), Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if is_status(&e, 404) => Ok(()),
            // Auto-removal is already in progress
            Err(e) if is_status(&e, 409) => {
                self.await_removal(id).await;
                Ok(())
            }
            Err(e) => Err(ContainerError::RemoveFailed {
                id: id.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn exists(&self, id: &ContainerId) -> Result<bool> {
        match self
            .docker
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_status(&e, 404) => Ok(false),
            Err(e) => Err(ContainerError::Runtime(format!(
                "failed to inspect container {id}: {e}"
            ))),
        }
    }
}
