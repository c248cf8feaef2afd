//! Concurrent stream draining
//!
//! Each drainer owns one child pipe and its consumer, and runs on its own
//! tokio task until the writer closes the pipe.

use crate::error::{ScriptrunError, ScriptrunResult};
use crate::process::consumer::LineConsumer;
use serde::Serialize;
use std::fmt;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Which child stream a drainer is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Outcome of a drained stream
#[derive(Debug)]
pub struct Drained<C> {
    pub kind: StreamKind,
    pub consumer: C,
    /// First decode or read failure, if any. Lines before it were delivered.
    pub error: Option<io::Error>,
}

impl<C> Drained<C> {
    /// Turn a recorded stream failure into a `Stream` error
    pub fn into_result(self) -> ScriptrunResult<C> {
        match self.error {
            None => Ok(self.consumer),
            Some(source) => Err(ScriptrunError::Stream {
                stream: self.kind,
                source,
            }),
        }
    }
}

/// Handle to a running drainer
pub struct DrainHandle<C> {
    kind: StreamKind,
    task: JoinHandle<Drained<C>>,
}

impl<C> DrainHandle<C> {
    /// Wait until the stream reaches end-of-input.
    ///
    /// Fails only if the drainer task itself died (a panicking consumer).
    pub async fn join(self) -> ScriptrunResult<Drained<C>> {
        self.task.await.map_err(|e| ScriptrunError::Stream {
            stream: self.kind,
            source: io::Error::other(format!("drainer task failed: {}", e)),
        })
    }
}

/// Spawns line-oriented readers over child output
pub struct StreamDrainer;

impl StreamDrainer {
    /// Start draining `reader` into `consumer` on a dedicated task
    pub fn spawn<R, C>(kind: StreamKind, reader: R, consumer: C) -> DrainHandle<C>
    where
        R: AsyncRead + Unpin + Send + 'static,
        C: LineConsumer,
    {
        let task = tokio::spawn(drain(kind, reader, consumer));
        DrainHandle { kind, task }
    }
}

async fn drain<R, C>(kind: StreamKind, reader: R, mut consumer: C) -> Drained<C>
where
    R: AsyncRead + Unpin,
    C: LineConsumer,
{
    let mut lines = BufReader::new(reader).lines();
    let mut count: u64 = 0;

    let error = loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                count += 1;
                consumer.consume(line);
            }
            Ok(None) => break None,
            Err(e) => {
                warn!("Error reading {}: {}", kind, e);
                // The child still writes here; keep the pipe empty until it closes.
                let mut rest = lines.into_inner();
                if let Err(e) = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await {
                    debug!("Discarding remaining {} failed: {}", kind, e);
                }
                break Some(e);
            }
        }
    };

    debug!("Drained {} lines from {}", count, kind);
    Drained {
        kind,
        consumer,
        error,
    }
}
