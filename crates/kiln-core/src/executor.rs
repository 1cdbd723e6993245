//! Executor - runs one request end to end in a fresh sandbox.

use crate::archive::build_archive;
use crate::collector::collect;
use crate::config::ExecutorConfig;
use crate::error::{CoreError, Result};
use crate::language::{Language, LanguageProfile};
use crate::provision::ImageProvisioner;
use crate::result::{ExecutionRequest, ExecutionResult};
use crate::sandbox::Sandbox;
use crate::supervisor::{race_deadline, Race};
use bytes::Bytes;
use kiln_container::{ContainerRuntime, DockerRuntime};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Executes untrusted programs, one ephemeral sandbox per request.
///
/// The executor is cheap to share behind an `Arc`; concurrent calls to
/// [`execute`](Self::execute) never touch the same sandbox.
///
/// # Example
///
/// ```no_run
/// use kiln_core::{ExecutionRequest, Executor, ExecutorConfig};
///
/// # async fn example() -> kiln_core::Result<()> {
/// let executor = Executor::docker(ExecutorConfig::default())?;
///
/// let result = executor
///     .execute(ExecutionRequest::new("python", "print(\"hi\")"))
///     .await;
/// assert_eq!(result.output, "hi\n");
/// # Ok(())
/// # }
/// ```
pub struct Executor {
    runtime: Arc<dyn ContainerRuntime>,
    provisioner: ImageProvisioner,
    config: ExecutorConfig,
    permits: Arc<Semaphore>,
}

impl Executor {
    /// Create an executor on top of `runtime`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if the configuration is invalid.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: ExecutorConfig) -> Result<Self> {
        config.validate()?;

        let permits = match config.max_concurrent_sandboxes {
            0 => Semaphore::MAX_PERMITS,
            n => n,
        };
        tracing::debug!(
            max_concurrent_sandboxes = config.max_concurrent_sandboxes,
            max_output_bytes = config.max_output_bytes,
            "Executor configured"
        );

        Ok(Self {
            provisioner: ImageProvisioner::new(Arc::clone(&runtime)),
            runtime,
            config,
            permits: Arc::new(Semaphore::new(permits)),
        })
    }

    /// Create an executor backed by the local Docker daemon.
    pub fn docker(config: ExecutorConfig) -> Result<Self> {
        let runtime = DockerRuntime::connect()?;
        Self::new(Arc::new(runtime), config)
    }

    /// Create an executor backed by the Docker daemon at `socket`.
    pub fn docker_at(socket: &str, config: ExecutorConfig) -> Result<Self> {
        let runtime = DockerRuntime::connect_with_socket(socket)?;
        Self::new(Arc::new(runtime), config)
    }

    /// Get the configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `request` and report how it went.
    ///
    /// Never fails: every failure kind is folded into the returned
    /// [`ExecutionResult`].
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let start = Instant::now();

        let profile = match Language::resolve(&request.language) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::info!(language = %request.language, "Rejected unsupported language");
                return ExecutionResult::unsupported_language(e.to_string(), start.elapsed());
            }
        };

        tracing::info!(
            language = profile.id,
            code_len = request.code.len(),
            stdin = request.stdin.is_some(),
            "Executing request"
        );

        let result = match self.run(profile, &request, start).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(language = profile.id, error = %e, "Execution failed");
                ExecutionResult::infra_error(e.to_string(), start.elapsed())
            }
        };

        tracing::info!(
            language = profile.id,
            outcome = %result.outcome,
            exit_code = result.exit_code,
            elapsed_ms = result.execution_time_ms,
            "Execution finished"
        );
        result
    }

    /// Ids of every supported language, in registry order.
    pub fn list_languages(&self) -> Vec<&'static str> {
        Language::ALL.iter().map(|language| language.id()).collect()
    }

    /// Whether the container runtime answers.
    pub async fn health_check(&self) -> bool {
        match self.runtime.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Container runtime unreachable");
                false
            }
        }
    }

    /// Stop admitting new sandboxes.
    ///
    /// Runs already in progress finish normally; later requests fail with
    /// an infrastructure error.
    pub fn shutdown(&self) {
        tracing::info!("Executor shutting down");
        self.permits.close();
    }

    /// Provision, create, run and always destroy.
    async fn run(
        &self,
        profile: &'static LanguageProfile,
        request: &ExecutionRequest,
        start: Instant,
    ) -> Result<ExecutionResult> {
        if self.permits.is_closed() {
            return Err(CoreError::ShuttingDown);
        }

        self.provisioner.ensure(profile.image).await?;
        let archive = build_archive(profile.filename, &request.code)?;

        let _permit = self.acquire().await?;
        let stdin = request.stdin.as_deref();
        let mut sandbox = match Sandbox::create(
            Arc::clone(&self.runtime),
            &self.config.name_prefix,
            profile,
            stdin.is_some(),
        )
        .await
        {
            Ok(sandbox) => sandbox,
            Err(e) => {
                // Image may have been removed behind our back
                self.provisioner.forget(profile.image).await;
                return Err(e);
            }
        };

        let result = self.drive(&mut sandbox, archive, stdin, start).await;

        let sandbox_id = sandbox.id();
        if let Err(e) = sandbox.destroy().await {
            tracing::warn!(sandbox_id = %sandbox_id, error = %e, "Sandbox teardown failed");
        }
        result
    }

    /// Inject, attach, start, then collect under the deadline.
    async fn drive(
        &self,
        sandbox: &mut Sandbox,
        archive: Bytes,
        stdin: Option<&str>,
        start: Instant,
    ) -> Result<ExecutionResult> {
        let setup = async {
            sandbox.inject(archive).await?;
            let attached = sandbox.attach(stdin.is_some()).await?;
            sandbox.start().await?;
            Ok::<_, CoreError>(attached)
        }
        .await;

        let attached = match setup {
            Ok(attached) => attached,
            Err(e) => {
                sandbox.mark_crashed();
                return Err(e);
            }
        };

        sandbox.mark_running();
        let timeout = sandbox.profile().timeout;
        let limit = self.config.max_output_bytes;

        let race = race_deadline(timeout, async {
            let collected = collect(attached, stdin, limit).await?;
            let exit_code = sandbox.wait_exit().await?;
            Ok::<_, CoreError>((collected, exit_code))
        })
        .await;

        match race {
            Race::Finished(Ok((collected, exit_code))) => Ok(ExecutionResult::exited(
                collected.stdout,
                collected.stderr,
                exit_code,
                start.elapsed(),
            )),
            Race::Finished(Err(e)) => Err(e),
            Race::DeadlineExpired => {
                if let Err(e) = sandbox.kill().await {
                    tracing::warn!(sandbox_id = %sandbox.id(), error = %e, "Kill failed");
                }
                Ok(ExecutionResult::timeout(start.elapsed()))
            }
        }
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| CoreError::ShuttingDown)
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}
