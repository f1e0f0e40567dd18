//! Runs one resolved install command with elevation, retries and fallbacks.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::logic::password::Credential;
use crate::platform::Platform;
use crate::template::split_fallback;

use super::command::install_invocation;
use super::spawn::{SpawnError, Spawner};

/// Retry, deadline and output policy for install commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecPolicy {
    /// Total attempts per command, including the first (at least 1).
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
    /// Deadline for a single process.
    pub command_timeout: Duration,
    /// Combined stdout + stderr bound for a single process.
    pub max_output_bytes: usize,
    /// Log commands instead of running them.
    pub dry_run: bool,
}

impl ExecPolicy {
    /// What: Default policy for `platform`.
    ///
    /// Output:
    /// - 3 attempts, platform retry delay (1 s Windows, 2 s elsewhere),
    ///   30 minute deadline, 10 MiB output, no dry run.
    #[must_use]
    pub const fn for_platform(platform: Platform) -> Self {
        Self {
            max_attempts: 3,
            retry_delay: platform.default_retry_delay(),
            command_timeout: Duration::from_secs(30 * 60),
            max_output_bytes: 10 * 1024 * 1024,
            dry_run: false,
        }
    }
}

/// Why an install command did not succeed.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The command ran and exited unsuccessfully on every attempt.
    #[error("{}", failure_text(.stderr, .exit))]
    CommandFailed {
        /// Trimmed stderr of the last attempt, ANSI sequences removed.
        stderr: String,
        /// Exit code of the last attempt (`None` if killed by a signal).
        exit: Option<i32>,
    },
    /// The process could not be run to completion (launch, timeout, output bound).
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// The resolved command was blank.
    #[error("installation command is empty")]
    EmptyCommand,
}

fn failure_text(stderr: &str, exit: &Option<i32>) -> String {
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    match exit {
        Some(code) => format!("command exited with status {code}"),
        None => "command was terminated by a signal".to_string(),
    }
}

/// Executes resolved install commands through a [`Spawner`].
pub struct Executor {
    /// Process launcher.
    spawner: Arc<dyn Spawner>,
    /// Host platform.
    platform: Platform,
    /// Retry and bound policy.
    policy: ExecPolicy,
}

impl Executor {
    /// Create an executor for `platform` using `spawner`.
    #[must_use]
    pub fn new(spawner: Arc<dyn Spawner>, platform: Platform, policy: ExecPolicy) -> Self {
        Self {
            spawner,
            platform,
            policy,
        }
    }

    /// Policy in effect.
    #[must_use]
    pub const fn policy(&self) -> &ExecPolicy {
        &self.policy
    }

    /// What: Run `command` elevated, retrying on failure.
    ///
    /// Inputs:
    /// - `command`: Resolved template command for the host platform.
    /// - `credential`: Elevation passphrase.
    ///
    /// Output:
    /// - stdout of the successful attempt.
    ///
    /// # Errors
    /// - The last attempt's error once `max_attempts` is exhausted.
    /// - `ExecError::EmptyCommand` without spawning anything.
    ///
    /// Details:
    /// - On macOS `A || B` is tried as A, then B only if A failed; A's failure
    ///   does not use up an attempt.
    /// - Attempts are separated by the fixed `retry_delay`.
    /// - Dry runs spawn nothing and return `DRY RUN: <command>`.
    pub async fn execute(&self, command: &str, credential: &Credential) -> Result<String, ExecError> {
        let alternatives = if self.platform.supports_fallback() {
            split_fallback(command)
        } else {
            let trimmed = command.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed]
            }
        };
        if alternatives.is_empty() {
            return Err(ExecError::EmptyCommand);
        }

        if self.policy.dry_run {
            tracing::info!(platform = %self.platform, command = %command, "dry run: skipping install command");
            return Ok(format!("DRY RUN: {command}"));
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(&alternatives, credential).await {
                Ok(stdout) => {
                    tracing::debug!(attempt, "install command succeeded");
                    return Ok(stdout);
                }
                Err(err) if attempt < max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        error = %err,
                        "install command failed; retrying"
                    );
                    tokio::time::sleep(self.policy.retry_delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(attempts = attempt, error = %err, "install command failed");
                    return Err(err);
                }
            }
        }
    }

    /// One attempt: alternatives in order until one succeeds.
    async fn attempt(&self, alternatives: &[&str], credential: &Credential) -> Result<String, ExecError> {
        let mut last_err = ExecError::EmptyCommand;
        for (idx, alternative) in alternatives.iter().enumerate() {
            match self.run_once(alternative, credential).await {
                Ok(stdout) => return Ok(stdout),
                Err(err) => {
                    if idx + 1 < alternatives.len() {
                        tracing::info!(error = %err, "primary install command failed; trying fallback");
                    }
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    async fn run_once(&self, command: &str, credential: &Credential) -> Result<String, ExecError> {
        let invocation = install_invocation(self.platform, command, credential, &self.policy);
        tracing::debug!(invocation = %invocation.display_line(), "running install command");
        let output = self.spawner.run(invocation).await?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(ExecError::CommandFailed {
                stderr: strip_ansi_escapes::strip_str(&output.stderr).trim().to_string(),
                exit: output.code,
            })
        }
    }
}
