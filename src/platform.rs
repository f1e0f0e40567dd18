//! Host platform tags used to pick install commands and invocation strategies.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Platform family an install command template is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Microsoft Windows; elevation is approval based (UAC).
    Windows,
    /// Apple macOS; commands may carry a `||` fallback alternative.
    Macos,
    /// Linux and every other Unix-like host.
    Linux,
}

impl Platform {
    /// What: Return the platform the daemon was compiled for.
    ///
    /// Output:
    /// - `Windows` on Windows, `Macos` on macOS, `Linux` everywhere else.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::Macos
        } else {
            Self::Linux
        }
    }

    /// What: Map an OS name as reported by `std::env::consts::OS` to a platform tag.
    ///
    /// Inputs:
    /// - `os`: OS name such as `windows`, `macos`, `linux`, `freebsd`.
    ///
    /// Output:
    /// - Matching tag; unknown names fall back to `Linux`.
    #[must_use]
    pub fn from_os(os: &str) -> Self {
        match os.trim().to_ascii_lowercase().as_str() {
            "windows" | "win32" => Self::Windows,
            "macos" | "darwin" => Self::Macos,
            _ => Self::Linux,
        }
    }

    /// Key used for this platform inside a command template.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Macos => "macos",
            Self::Linux => "linux",
        }
    }

    /// Whether `A || B` in a command means "try A, then B".
    #[must_use]
    pub const fn supports_fallback(self) -> bool {
        matches!(self, Self::Macos)
    }

    /// Whether elevation goes through `sudo` with a piped passphrase.
    #[must_use]
    pub const fn uses_sudo(self) -> bool {
        !matches!(self, Self::Windows)
    }

    /// Default pause between retries of a failed install command.
    #[must_use]
    pub const fn default_retry_delay(self) -> Duration {
        match self {
            Self::Windows => Duration::from_secs(1),
            Self::Macos | Self::Linux => Duration::from_secs(2),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
