//! Child process launching with a bounded output buffer and a deadline.
//!
//! [`SystemSpawner`] is the only type in the crate that starts OS processes;
//! the credential probe and the executor both go through the [`Spawner`] seam.

use std::fmt;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use zeroize::Zeroizing;

use super::utils::shell_single_quote;

/// One process to launch, described as an argument vector.
#[derive(Clone)]
pub struct Invocation {
    /// Program name resolved against `PATH`.
    pub program: String,
    /// Arguments passed verbatim (no shell interpretation).
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Bytes written to stdin before it is closed; `None` means `/dev/null`.
    pub stdin: Option<Zeroizing<Vec<u8>>>,
    /// Wall-clock bound for the process.
    pub timeout: Duration,
    /// Combined stdout + stderr bound; exceeding it is an error.
    pub max_output_bytes: usize,
}

impl Invocation {
    /// What: Start an invocation of `program` with defaults (no stdin, 10 MiB, 30 min).
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            timeout: Duration::from_secs(30 * 60),
            max_output_bytes: 10 * 1024 * 1024,
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Feed `bytes` on stdin.
    #[must_use]
    pub fn stdin(mut self, bytes: Zeroizing<Vec<u8>>) -> Self {
        self.stdin = Some(bytes);
        self
    }

    /// Set the deadline.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the output bound.
    #[must_use]
    pub const fn max_output_bytes(mut self, limit: usize) -> Self {
        self.max_output_bytes = limit;
        self
    }

    /// Whether anything is piped on stdin.
    #[must_use]
    pub const fn has_stdin(&self) -> bool {
        self.stdin.is_some()
    }

    /// What: Render the invocation as a POSIX shell line for logs and dry runs.
    ///
    /// Details:
    /// - Every argument is single-quoted; stdin contents are never included.
    #[must_use]
    pub fn display_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&shell_single_quote(arg));
        }
        line
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &self.env)
            .field("stdin", &self.stdin.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("max_output_bytes", &self.max_output_bytes)
            .finish()
    }
}

/// Captured result of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured stdout (lossy UTF-8).
    pub stdout: String,
    /// Captured stderr (lossy UTF-8).
    pub stderr: String,
}

impl ProcessOutput {
    /// Exit code zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Failures that prevent a process from producing a [`ProcessOutput`].
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The program is not on `PATH`.
    #[error("{program} was not found on PATH")]
    NotFound {
        /// Program that was looked up.
        program: String,
    },
    /// The OS refused to start the program.
    #[error("failed to launch {program}: {source}")]
    Launch {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Reading output or waiting for exit failed.
    #[error("failed to collect process output: {0}")]
    Io(#[source] std::io::Error),
    /// The deadline elapsed; the child was killed.
    #[error("command timed out after {}s", .after.as_secs())]
    TimedOut {
        /// Deadline that elapsed.
        after: Duration,
    },
    /// Output exceeded the bound; the child was killed.
    #[error("command output exceeded {limit} bytes")]
    OutputLimit {
        /// Bound that was exceeded.
        limit: usize,
    },
}

/// Launches processes described by an [`Invocation`].
#[async_trait]
pub trait Spawner: Send + Sync + 'static {
    /// Run `invocation` to completion, honoring its deadline and output bound.
    async fn run(&self, invocation: Invocation) -> Result<ProcessOutput, SpawnError>;
}

/// [`Spawner`] backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpawner;

#[async_trait]
impl Spawner for SystemSpawner {
    /// What: Spawn the program, feed stdin, collect output under the bounds.
    ///
    /// Inputs:
    /// - `invocation`: Program, arguments, environment, stdin and bounds.
    ///
    /// Output:
    /// - `ProcessOutput` once the child exits; non-zero exits are not errors here.
    ///
    /// Details:
    /// - The program is resolved with `which` first so a missing elevation
    ///   tool is reported as `NotFound` without spawning anything.
    /// - stdout and stderr share one byte budget.
    /// - On timeout or overflow the child is killed before returning.
    async fn run(&self, invocation: Invocation) -> Result<ProcessOutput, SpawnError> {
        let Ok(path) = which::which(&invocation.program) else {
            return Err(SpawnError::NotFound {
                program: invocation.program,
            });
        };

        let mut cmd = Command::new(path);
        cmd.args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SpawnError::Launch {
            program: invocation.program.clone(),
            source,
        })?;
        tracing::trace!(program = %invocation.program, pid = ?child.id(), "spawned child process");

        if let Some(bytes) = invocation.stdin.as_ref()
            && let Some(mut stdin) = child.stdin.take()
        {
            // The child may exit before reading (e.g. cached elevation), so a
            // broken pipe here is not fatal.
            if let Err(err) = stdin.write_all(bytes).await {
                tracing::debug!(error = %err, "child closed stdin early");
            }
            drop(stdin);
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let used = AtomicUsize::new(0);
        let limit = invocation.max_output_bytes;

        let result = {
            let collect = async {
                tokio::try_join!(
                    read_capped(stdout, &used, limit),
                    read_capped(stderr, &used, limit),
                    async { child.wait().await.map_err(SpawnError::Io) },
                )
            };
            match tokio::time::timeout(invocation.timeout, collect).await {
                Ok(collected) => collected,
                Err(_) => Err(SpawnError::TimedOut {
                    after: invocation.timeout,
                }),
            }
        };

        match result {
            Ok((out, err, status)) => Ok(ProcessOutput {
                code: status.code(),
                stdout: String::from_utf8_lossy(&out).into_owned(),
                stderr: String::from_utf8_lossy(&err).into_owned(),
            }),
            Err(err) => {
                if let Err(kill_err) = child.kill().await {
                    tracing::debug!(error = %kill_err, "failed to kill child process");
                }
                Err(err)
            }
        }
    }
}

/// Read a pipe to EOF, failing once the shared budget is exceeded.
async fn read_capped<R>(
    reader: Option<R>,
    used: &AtomicUsize,
    limit: usize,
) -> Result<Vec<u8>, SpawnError>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(Vec::new());
    };
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await.map_err(SpawnError::Io)?;
        if n == 0 {
            return Ok(buf);
        }
        if used.fetch_add(n, Ordering::Relaxed) + n > limit {
            return Err(SpawnError::OutputLimit { limit });
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
