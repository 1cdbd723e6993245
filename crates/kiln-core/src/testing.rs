//! In-memory container runtime double for unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use kiln_container::{
    Attached, ContainerConfig, ContainerError, ContainerId, ContainerRuntime, ExitFuture,
    OutputFrame, Result,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::io::ReaderStream;

/// What the fake "container process" does once started.
#[derive(Debug, Clone)]
pub(crate) enum Program {
    /// Print and exit with `code`.
    Exit {
        stdout: &'static str,
        stderr: &'static str,
        code: i64,
    },
    /// Copy stdin to stdout until stdin is closed, then exit 0.
    Echo,
    /// Never produce output, never exit.
    Hang,
    /// Emit some output, then fail the stream.
    BrokenStream,
    /// Emit `bytes` bytes of stdout, then exit 0.
    Flood { bytes: usize },
}

#[derive(Default)]
struct State {
    images: HashSet<String>,
    live: HashSet<ContainerId>,
    created: Vec<ContainerId>,
    names: Vec<String>,
    configs: Vec<ContainerConfig>,
    uploads: Vec<(ContainerId, String, Bytes)>,
    removals: HashMap<ContainerId, u32>,
    kills: Vec<ContainerId>,
}

pub(crate) struct FakeRuntime {
    state: Mutex<State>,
    program: Mutex<Program>,
    next_id: AtomicU64,
    pulls: AtomicUsize,
    inspects: AtomicUsize,
    reachable: AtomicBool,
    fail_pulls: AtomicBool,
    fail_create: AtomicBool,
    fail_upload: AtomicBool,
    fail_start: AtomicBool,
}

impl FakeRuntime {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            program: Mutex::new(Program::Exit {
                stdout: "",
                stderr: "",
                code: 0,
            }),
            next_id: AtomicU64::new(1),
            pulls: AtomicUsize::new(0),
            inspects: AtomicUsize::new(0),
            reachable: AtomicBool::new(true),
            fail_pulls: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            fail_upload: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
        }
    }

    /// A fake with every registry image already present.
    pub(crate) fn with_images() -> Self {
        let fake = Self::new();
        for language in crate::Language::ALL {
            fake.add_image(language.profile().image);
        }
        fake
    }

    pub(crate) fn add_image(&self, image: &str) {
        self.state.lock().unwrap().images.insert(image.to_string());
    }

    pub(crate) fn set_program(&self, program: Program) {
        *self.program.lock().unwrap() = program;
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub(crate) fn fail_pulls(&self, fail: bool) {
        self.fail_pulls.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_upload(&self, fail: bool) {
        self.fail_upload.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub(crate) fn inspect_count(&self) -> usize {
        self.inspects.load(Ordering::SeqCst)
    }

    pub(crate) fn created(&self) -> Vec<ContainerId> {
        self.state.lock().unwrap().created.clone()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.state.lock().unwrap().names.clone()
    }

    pub(crate) fn configs(&self) -> Vec<ContainerConfig> {
        self.state.lock().unwrap().configs.clone()
    }

    pub(crate) fn uploads(&self) -> Vec<(ContainerId, String, Bytes)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    pub(crate) fn removal_count(&self, id: &ContainerId) -> u32 {
        self.state
            .lock()
            .unwrap()
            .removals
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn kills(&self) -> Vec<ContainerId> {
        self.state.lock().unwrap().kills.clone()
    }

    fn program(&self) -> Program {
        self.program.lock().unwrap().clone()
    }

    fn check_live(&self, id: &ContainerId) -> Result<()> {
        if self.state.lock().unwrap().live.contains(id) {
            Ok(())
        } else {
            Err(ContainerError::Runtime(format!("no such container: {id}")))
        }
    }
}

fn stdout(text: &'static str) -> Result<OutputFrame> {
    Ok(OutputFrame::Stdout(Bytes::from_static(text.as_bytes())))
}

fn stderr(text: &'static str) -> Result<OutputFrame> {
    Ok(OutputFrame::Stderr(Bytes::from_static(text.as_bytes())))
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ContainerError::Runtime("ping failed: connection refused".into()))
        }
    }

    async fn image_present(&self, image: &str) -> Result<bool> {
        self.inspects.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().images.contains(image))
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        if self.fail_pulls.load(Ordering::SeqCst) {
            return Err(ContainerError::PullFailed {
                image: image.to_string(),
                reason: "manifest unknown".into(),
            });
        }
        self.add_image(image);
        Ok(())
    }

    async fn create(&self, name: &str, config: &ContainerConfig) -> Result<ContainerId> {
        let mut state = self.state.lock().unwrap();
        if self.fail_create.load(Ordering::SeqCst) || !state.images.contains(&config.image) {
            return Err(ContainerError::CreateFailed {
                name: name.to_string(),
                reason: format!("No such image: {}", config.image),
            });
        }

        let id = ContainerId::new(format!(
            "fake{:08}",
            self.next_id.fetch_add(1, Ordering::SeqCst)
        ));
        state.live.insert(id.clone());
        state.created.push(id.clone());
        state.names.push(name.to_string());
        state.configs.push(config.clone());
        Ok(id)
    }

    fn exit_status(&self, _id: &ContainerId) -> ExitFuture {
        let code = match self.program() {
            Program::Exit { code, .. } => code,
            Program::Echo | Program::Flood { .. } => 0,
            Program::BrokenStream => 137,
            Program::Hang => return Box::pin(futures::future::pending::<Result<i64>>()),
        };
        Box::pin(futures::future::ready::<Result<i64>>(Ok(code)))
    }

    async fn upload_archive(&self, id: &ContainerId, path: &str, archive: Bytes) -> Result<()> {
        self.check_live(id)?;
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(ContainerError::UploadFailed {
                id: id.to_string(),
                reason: "no space left on device".into(),
            });
        }
        self.state
            .lock()
            .unwrap()
            .uploads
            .push((id.clone(), path.to_string(), archive));
        Ok(())
    }

    async fn attach(&self, id: &ContainerId, _stdin: bool) -> Result<Attached> {
        self.check_live(id)?;

        let attached = match self.program() {
            Program::Exit { stdout: out, stderr: err, .. } => {
                let mut frames = Vec::new();
                if !out.is_empty() {
                    frames.push(stdout(out));
                }
                if !err.is_empty() {
                    frames.push(stderr(err));
                }
                Attached {
                    output: stream::iter(frames).boxed(),
                    input: Box::pin(tokio::io::sink()),
                }
            }
            Program::Echo => {
                let (writer, reader) = tokio::io::duplex(64 * 1024);
                let output = ReaderStream::new(reader)
                    .map(|chunk| {
                        chunk
                            .map(OutputFrame::Stdout)
                            .map_err(|e| ContainerError::Stream(e.to_string()))
                    })
                    .boxed();
                Attached {
                    output,
                    input: Box::pin(writer),
                }
            }
            Program::Hang => Attached {
                output: stream::pending::<Result<OutputFrame>>().boxed(),
                input: Box::pin(tokio::io::sink()),
            },
            Program::BrokenStream => Attached {
                output: stream::iter(vec![
                    stdout("partial"),
                    Err(ContainerError::Stream("connection reset by peer".into())),
                ])
                .boxed(),
                input: Box::pin(tokio::io::sink()),
            },
            Program::Flood { bytes } => {
                let chunk = Bytes::from(vec![b'a'; 8 * 1024]);
                let frames: Vec<_> = (0..bytes.div_ceil(chunk.len()))
                    .map(|i| {
                        let len = chunk.len().min(bytes - i * chunk.len());
                        Ok(OutputFrame::Stdout(chunk.slice(..len)))
                    })
                    .collect();
                Attached {
                    output: stream::iter(frames).boxed(),
                    input: Box::pin(tokio::io::sink()),
                }
            }
        };
        Ok(attached)
    }

    async fn start(&self, id: &ContainerId) -> Result<()> {
        self.check_live(id)?;
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(ContainerError::StartFailed {
                id: id.to_string(),
                reason: "OCI runtime create failed".into(),
            });
        }
        Ok(())
    }

    async fn kill(&self, id: &ContainerId) -> Result<()> {
        self.state.lock().unwrap().kills.push(id.clone());
        Ok(())
    }

    async fn remove(&self, id: &ContainerId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        *state.removals.entry(id.clone()).or_default() += 1;
        state.live.remove(id);
        Ok(())
    }

    async fn exists(&self, id: &ContainerId) -> Result<bool> {
        Ok(self.state.lock().unwrap().live.contains(id))
    }
}
