//! Privilege-elevation credential handling and validation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::install::command::probe_invocation;
use crate::install::spawn::Spawner;
use crate::platform::Platform;

/// Reasons a supplied passphrase cannot be used as a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// Nothing was supplied.
    #[error("sudo password is required")]
    Missing,
    /// The passphrase contains a line break or NUL and cannot be piped to `sudo -S`.
    #[error("sudo password contains characters that cannot be passed to the elevation tool")]
    Unpipeable,
}

/// A local privilege-elevation passphrase held for one batch.
///
/// The buffer is wiped on drop and the value never shows up in `Debug` output.
pub struct Credential {
    secret: Zeroizing<String>,
}

impl Credential {
    /// What: Wrap a caller-supplied passphrase.
    ///
    /// Inputs:
    /// - `secret`: The passphrase; ownership moves into the zeroizing buffer.
    ///
    /// Output:
    /// - A `Credential`, or an error when it is empty or unpipeable.
    ///
    /// # Errors
    /// - `CredentialError::Missing` for an empty string.
    /// - `CredentialError::Unpipeable` when it contains `\n`, `\r` or `\0`.
    pub fn new(secret: String) -> Result<Self, CredentialError> {
        let secret = Zeroizing::new(secret);
        if secret.is_empty() {
            return Err(CredentialError::Missing);
        }
        if secret.contains(['\n', '\r', '\0']) {
            return Err(CredentialError::Unpipeable);
        }
        Ok(Self { secret })
    }

    /// Bytes written to the elevation tool's stdin: the passphrase and a newline.
    #[must_use]
    pub fn stdin_line(&self) -> Zeroizing<Vec<u8>> {
        let mut line = Zeroizing::new(Vec::with_capacity(self.secret.len() + 1));
        line.extend_from_slice(self.secret.as_bytes());
        line.push(b'\n');
        line
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Decides whether a credential authorizes elevated execution on this host.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Returns `true` only when elevation with `credential` succeeded.
    async fn validate(&self, credential: &Credential) -> bool;
}

/// Validator that runs a no-op elevated probe through a [`Spawner`].
pub struct ElevationProbe {
    /// Process launcher shared with the executor.
    spawner: Arc<dyn Spawner>,
    /// Host platform selecting the probe strategy.
    platform: Platform,
    /// Upper bound for the probe process.
    timeout: Duration,
}

impl ElevationProbe {
    /// What: Build a probe for `platform` bounded by `timeout`.
    #[must_use]
    pub fn new(spawner: Arc<dyn Spawner>, platform: Platform, timeout: Duration) -> Self {
        Self {
            spawner,
            platform,
            timeout,
        }
    }
}

#[async_trait]
impl CredentialValidator for ElevationProbe {
    /// What: Validate a credential without performing any install action.
    ///
    /// Inputs:
    /// - `credential`: Passphrase to test.
    ///
    /// Output:
    /// - `true` iff the probe exits successfully within the timeout.
    ///
    /// Details:
    /// - Unix: `sudo -S -k -v` with the passphrase on stdin. `-k` ignores any
    ///   cached timestamp so the passphrase itself is checked.
    /// - Windows: an elevated no-op PowerShell via `Start-Process -Verb RunAs`.
    /// - Spawn errors, timeouts and non-zero exits all yield `false`. The
    ///   credential is never logged; only the exit code is.
    async fn validate(&self, credential: &Credential) -> bool {
        let invocation = probe_invocation(self.platform, credential, self.timeout);
        match self.spawner.run(invocation).await {
            Ok(output) if output.success() => {
                tracing::debug!(platform = %self.platform, "elevation probe accepted credential");
                true
            }
            Ok(output) => {
                tracing::info!(
                    platform = %self.platform,
                    exit = ?output.code,
                    "elevation probe rejected credential"
                );
                false
            }
            Err(err) => {
                tracing::warn!(platform = %self.platform, error = %err, "elevation probe failed");
                false
            }
        }
    }
}
