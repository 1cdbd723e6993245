//! Output collection.
//!
//! Drains a sandbox's demultiplexed output channel into separate stdout and
//! stderr accumulators while feeding one-shot stdin on the side.

use crate::error::{CoreError, Result};
use futures::StreamExt;
use kiln_container::{Attached, InputSink, OutputFrame};
use tokio::io::AsyncWriteExt;

/// Appended to a stream that hit the byte cap.
pub const TRUNCATION_MARKER: &str = "\n[output truncated]";

/// Everything a sandbox wrote before its output channel closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

/// Byte accumulator that keeps at most `limit` bytes.
#[derive(Debug)]
struct Capped {
    buf: Vec<u8>,
    limit: usize,
    dropped: usize,
}

impl Capped {
    fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.buf.len());
        let take = room.min(chunk.len());
        self.buf.extend_from_slice(&chunk[..take]);
        self.dropped += chunk.len() - take;
    }

    fn finish(self) -> String {
        let mut text = String::from_utf8_lossy(&self.buf).into_owned();
        if self.dropped > 0 {
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}

/// Read the output channel to end-of-stream.
///
/// If `stdin` is given it is written once and the input side is closed;
/// a program that exits without reading it does not fail the collection.
/// Each stream keeps at most `limit` bytes.
///
/// # Errors
///
/// Returns the transport error if the output channel breaks.
pub async fn collect(attached: Attached, stdin: Option<&str>, limit: usize) -> Result<Collected> {
    let Attached { mut output, input } = attached;

    let feed = feed_stdin(input, stdin);
    let read = async {
        let mut stdout = Capped::new(limit);
        let mut stderr = Capped::new(limit);
        let mut frames = 0usize;

        while let Some(frame) = output.next().await {
            frames += 1;
            match frame? {
                OutputFrame::Stdout(bytes) => stdout.push(&bytes),
                OutputFrame::Stderr(bytes) => stderr.push(&bytes),
                OutputFrame::Other(bytes) => {
                    tracing::trace!(bytes = bytes.len(), "Ignoring non-output frame");
                }
            }
        }

        if stdout.dropped > 0 || stderr.dropped > 0 {
            tracing::debug!(
                stdout_dropped = stdout.dropped,
                stderr_dropped = stderr.dropped,
                "Output truncated"
            );
        }
        tracing::trace!(frames, "Output channel closed");
        Ok::<_, CoreError>(Collected {
            stdout: stdout.finish(),
            stderr: stderr.finish(),
        })
    };

    let ((), collected) = tokio::join!(feed, read);
    collected
}

async fn feed_stdin(mut input: InputSink, stdin: Option<&str>) {
    let result = async {
        if let Some(text) = stdin {
            input.write_all(text.as_bytes()).await?;
            input.flush().await?;
        }
        input.shutdown().await
    }
    .await;

    if let Err(e) = result {
        tracing::debug!(error = %e, "Stdin closed early");
    }
}
