//! External process execution with concurrent output capture
//!
//! Stdout and stderr are drained on two independent tasks while the caller
//! waits for exit. A child writing heavily to one pipe can never block on it
//! while we are waiting on the other, whatever the output volume.

use crate::error::{ScriptrunError, ScriptrunResult};
use crate::process::consumer::{LineCollector, LineConsumer};
use crate::process::drain::{StreamDrainer, StreamKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Exit code reported when the child was terminated by a signal
pub const SIGNALED_EXIT_CODE: i32 = -1;

/// Captured outcome of one command execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessResult {
    command: Vec<String>,
    exit_code: i32,
    stdout: String,
    stderr: String,
}

impl ProcessResult {
    pub fn new(command: Vec<String>, exit_code: i32, stdout: String, stderr: String) -> Self {
        Self {
            command,
            exit_code,
            stdout,
            stderr,
        }
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Whether the command exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }

    pub fn stderr_lines(&self) -> impl Iterator<Item = &str> {
        self.stderr.lines()
    }
}

impl fmt::Display for ProcessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` exited with {}",
            self.command.join(" "),
            self.exit_code
        )
    }
}

/// Why a run stopped before the child exited on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Deadline,
    Cancelled,
}

/// Cloneable cancellation signal for in-flight runs
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation; every run observing this token kills its child
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender is owned by self, so this is unreachable in practice.
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Exit code plus the consumers that received each stream
#[derive(Debug)]
pub struct Finished<O, E> {
    pub exit_code: i32,
    pub stdout: O,
    pub stderr: E,
    /// Set when the child was killed by the deadline or a cancel token
    pub interrupted: Option<Interrupt>,
}

/// Spawns commands and captures their output
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    env: BTreeMap<String, String>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default environment override applied to every run
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Default working directory, used when a run does not pass one
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Kill the child if it has not exited within `timeout`
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Run with the runner's defaults only
    pub async fn exec(&self, argv: &[String]) -> ScriptrunResult<ProcessResult> {
        self.run(argv, None, &BTreeMap::new()).await
    }

    /// Run `argv` and capture both streams.
    ///
    /// `env` is merged over the runner's overrides, which are merged over the
    /// inherited environment. A nonzero exit code is returned as data.
    pub async fn run(
        &self,
        argv: &[String],
        working_dir: Option<&Path>,
        env: &BTreeMap<String, String>,
    ) -> ScriptrunResult<ProcessResult> {
        let finished = self
            .run_with(
                argv,
                working_dir,
                env,
                LineCollector::new(),
                LineCollector::new(),
            )
            .await?;

        let result = ProcessResult::new(
            argv.to_vec(),
            finished.exit_code,
            finished.stdout.text(),
            finished.stderr.text(),
        );

        match finished.interrupted {
            None => Ok(result),
            Some(interrupt) => Err(self.interruption_error(argv, interrupt, result)),
        }
    }

    /// Error reported for a run that was killed early, carrying what it captured
    pub fn interruption_error(
        &self,
        argv: &[String],
        interrupt: Interrupt,
        partial: ProcessResult,
    ) -> ScriptrunError {
        let command = argv.join(" ");
        let partial = Box::new(partial);
        match interrupt {
            Interrupt::Deadline => ScriptrunError::TimedOut {
                command,
                timeout: self.timeout.unwrap_or_default(),
                partial,
            },
            Interrupt::Cancelled => ScriptrunError::Cancelled { command, partial },
        }
    }

    /// Run `argv`, feeding each stream line by line into its own consumer.
    ///
    /// Returns only after the child has exited and both streams reached
    /// end-of-input. The deadline and cancel token cover both phases: when
    /// either fires, the child's whole process group is killed, including
    /// background jobs still holding its pipes after it exited.
    pub async fn run_with<O, E>(
        &self,
        argv: &[String],
        working_dir: Option<&Path>,
        env: &BTreeMap<String, String>,
        stdout_consumer: O,
        stderr_consumer: E,
    ) -> ScriptrunResult<Finished<O, E>>
    where
        O: LineConsumer,
        E: LineConsumer,
    {
        let Some((program, args)) = argv.split_first() else {
            return Err(ScriptrunError::spawn(
                "<empty>",
                io::Error::new(io::ErrorKind::InvalidInput, "empty command line"),
            ));
        };
        let command_line = argv.join(" ");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&self.env)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so an interrupt reaches grandchildren holding the pipes.
        #[cfg(unix)]
        cmd.process_group(0);

        if let Some(dir) = working_dir.or(self.current_dir.as_deref()) {
            cmd.current_dir(dir);
        }

        debug!("Spawning: {:?}", argv);
        let mut child = cmd
            .spawn()
            .map_err(|e| ScriptrunError::spawn(command_line.clone(), e))?;
        let pgid = child.id();

        let stdout = child.stdout.take().ok_or_else(|| {
            ScriptrunError::spawn(command_line.clone(), io::Error::other("stdout not piped"))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            ScriptrunError::spawn(command_line.clone(), io::Error::other("stderr not piped"))
        })?;

        let out = StreamDrainer::spawn(StreamKind::Stdout, stdout, stdout_consumer);
        let err = StreamDrainer::spawn(StreamKind::Stderr, stderr, stderr_consumer);

        let interrupt = self.interrupted();
        tokio::pin!(interrupt);

        let waited = tokio::select! {
            status = child.wait() => status.map(Ok),
            reason = &mut interrupt => {
                warn!("Killing child process: {:?}", reason);
                kill_group(pgid);
                if let Err(e) = child.kill().await {
                    // Already exited between the wakeup and the kill.
                    debug!("Kill failed: {}", e);
                }
                Ok(Err(reason))
            }
        };
        let waited =
            waited.map_err(|e| ScriptrunError::io(format!("waiting for {}", command_line), e));

        let mut interrupted = match &waited {
            Ok(Err(reason)) => Some(*reason),
            _ => None,
        };

        // Pipes can still hold unread bytes after exit, so always join both.
        let drained = async { tokio::join!(out.join(), err.join()) };
        tokio::pin!(drained);
        let (out, err) = match &waited {
            Ok(Ok(_)) => tokio::select! {
                joined = &mut drained => joined,
                late = &mut interrupt => {
                    // The child exited but something it started still holds a pipe.
                    warn!("Output still open after exit, killing process group: {:?}", late);
                    kill_group(pgid);
                    interrupted = Some(late);
                    drained.await
                }
            },
            Ok(Err(_)) => drained.await,
            Err(_) => {
                // Without an exit status the child may still hold the pipes open.
                kill_group(pgid);
                let _ = child.start_kill();
                drained.await
            }
        };

        let exit_code = match waited? {
            Ok(status) => status.code().unwrap_or(SIGNALED_EXIT_CODE),
            Err(_) => SIGNALED_EXIT_CODE,
        };
        let stdout = out?.into_result()?;
        let stderr = err?.into_result()?;
        debug!("{} exited with {}", command_line, exit_code);

        Ok(Finished {
            exit_code,
            stdout,
            stderr,
            interrupted,
        })
    }

    /// Resolves when the deadline passes or the cancel token fires
    async fn interrupted(&self) -> Interrupt {
        let deadline = async {
            match self.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = deadline => Interrupt::Deadline,
            _ = cancelled => Interrupt::Cancelled,
        }
    }
}

/// SIGKILL every process in the child's group
#[cfg(unix)]
fn kill_group(pgid: Option<u32>) {
    let Some(pgid) = pgid.and_then(|id| libc::pid_t::try_from(id).ok()) else {
        return;
    };
    // SAFETY: killpg takes plain integers and touches no memory of ours.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        debug!("killpg({}) failed: {}", pgid, io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: Option<u32>) {}
