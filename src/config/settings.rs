use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use crate::install::{BatchPolicy, ExecPolicy};
use crate::platform::Platform;
use crate::util::config::{parse_bool, skip_comment_or_empty, split_key_value, strip_inline_comment};

use super::paths::{resolve_relative, settings_path};
use super::skeleton::SETTINGS_SKELETON_CONTENT;

/// Default listen address.
pub const DEFAULT_BIND: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 7400));

/// Where installation records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Process memory; lost on exit.
    Memory,
    /// JSON file at `store_path`.
    File,
}

/// Daemon settings loaded from `settings.conf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Listen address.
    pub bind: SocketAddr,
    /// Bearer token required on every request, if set.
    pub api_token: Option<String>,
    /// TOML app catalog.
    pub catalog_path: PathBuf,
    /// Record store backend.
    pub store: StoreKind,
    /// JSON file for [`StoreKind::File`].
    pub store_path: PathBuf,
    /// Skip process spawning for install commands.
    pub dry_run: bool,
    /// Attempts per app.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Apps per runner chunk.
    pub chunk_size: usize,
    /// Progress persistence step in percent.
    pub progress_step: u8,
    /// Elevation probe timeout.
    pub probe_timeout: Duration,
    /// Per-command timeout.
    pub command_timeout: Duration,
    /// Combined stdout/stderr cap per command.
    pub max_output_bytes: usize,
    /// Attempts for the final status write.
    pub terminal_write_attempts: u32,
}

impl Settings {
    /// What: Built-in defaults for `platform` with paths under `config_dir`.
    #[must_use]
    pub fn defaults(config_dir: &Path, platform: Platform) -> Self {
        let exec = ExecPolicy::for_platform(platform);
        let batch = BatchPolicy::default();
        Self {
            bind: DEFAULT_BIND,
            api_token: None,
            catalog_path: config_dir.join("catalog.toml"),
            store: StoreKind::File,
            store_path: config_dir.join("installations.json"),
            dry_run: exec.dry_run,
            max_attempts: exec.max_attempts,
            retry_delay: exec.retry_delay,
            chunk_size: batch.chunk_size,
            progress_step: batch.progress_step,
            probe_timeout: Duration::from_secs(5),
            command_timeout: exec.command_timeout,
            max_output_bytes: exec.max_output_bytes,
            terminal_write_attempts: batch.terminal_write_attempts,
        }
    }

    /// Executor policy derived from these settings.
    #[must_use]
    pub const fn exec_policy(&self) -> ExecPolicy {
        ExecPolicy {
            max_attempts: self.max_attempts,
            retry_delay: self.retry_delay,
            command_timeout: self.command_timeout,
            max_output_bytes: self.max_output_bytes,
            dry_run: self.dry_run,
        }
    }

    /// Runner policy derived from these settings.
    #[must_use]
    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            chunk_size: self.chunk_size,
            progress_step: self.progress_step,
            terminal_write_attempts: self.terminal_write_attempts,
            ..BatchPolicy::default()
        }
    }
}

/// What: Load settings from `<config_dir>/settings.conf`.
///
/// Inputs:
/// - `config_dir`: Resolved config directory.
/// - `platform`: Host platform, for platform-dependent defaults.
///
/// Output:
/// - Defaults overlaid with the file's values.
///
/// # Errors
/// - The file exists but cannot be read, or the skeleton cannot be written.
///
/// Details:
/// - A missing or empty file is replaced by the commented skeleton first.
pub fn load(config_dir: &Path, platform: Platform) -> Result<Settings> {
    let path = settings_path(config_dir);
    ensure_skeleton(&path)?;
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut settings = Settings::defaults(config_dir, platform);
    parse_settings(&content, config_dir, &mut settings);
    Ok(settings)
}

fn ensure_skeleton(path: &Path) -> Result<()> {
    if matches!(std::fs::metadata(path), Ok(meta) if meta.len() > 0) {
        return Ok(());
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    std::fs::write(path, SETTINGS_SKELETON_CONTENT)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote default settings");
    Ok(())
}

/// Parse `val` or warn and keep the current value.
fn parse_or_warn<T: FromStr>(key: &str, val: &str, slot: &mut T) {
    match val.parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => warn!(key, value = val, "invalid setting; keeping default"),
    }
}

/// Parse a value that must be at least `min`.
fn parse_at_least<T>(key: &str, val: &str, min: T, slot: &mut T)
where
    T: FromStr + PartialOrd + Copy + std::fmt::Display,
{
    match val.parse::<T>() {
        Ok(v) if v >= min => *slot = v,
        Ok(v) => warn!(key, value = %v, minimum = %min, "setting below minimum; keeping default"),
        Err(_) => warn!(key, value = val, "invalid setting; keeping default"),
    }
}

/// What: Apply `settings.conf` content to `settings`.
///
/// Inputs:
/// - `content`: File content.
/// - `config_dir`: Base for relative `catalog_path`/`store_path`.
/// - `settings`: Values to overwrite.
///
/// Details:
/// - Unknown keys are ignored; unparsable or out-of-range values keep the
///   previous value and log a warning.
/// - Blank `api_token` disables the token check. The token is taken verbatim,
///   so `#` and `//` inside it are not treated as comments.
pub fn parse_settings(content: &str, config_dir: &Path, settings: &mut Settings) {
    for line in content.lines() {
        if skip_comment_or_empty(line) {
            continue;
        }
        let Some((key, raw)) = split_key_value(line) else {
            continue;
        };
        if matches!(key.as_str(), "api_token" | "token") {
            settings.api_token = (!raw.is_empty()).then(|| raw.to_string());
            continue;
        }
        let val = strip_inline_comment(raw);
        match key.as_str() {
            "bind" | "listen" => parse_or_warn(&key, val, &mut settings.bind),
            "catalog_path" | "catalog" => {
                if !val.is_empty() {
                    settings.catalog_path = resolve_relative(config_dir, val);
                }
            }
            "store" | "store_kind" => match val.to_ascii_lowercase().as_str() {
                "memory" | "mem" => settings.store = StoreKind::Memory,
                "file" | "json" => settings.store = StoreKind::File,
                _ => warn!(key = %key, value = val, "unknown store kind; keeping default"),
            },
            "store_path" => {
                if !val.is_empty() {
                    settings.store_path = resolve_relative(config_dir, val);
                }
            }
            "dry_run" => match parse_bool(val) {
                Some(v) => settings.dry_run = v,
                None => warn!(key = %key, value = val, "invalid setting; keeping default"),
            },
            "max_attempts" | "attempts" => {
                parse_at_least(&key, val, 1, &mut settings.max_attempts);
            }
            "retry_delay_ms" => {
                let mut ms = u64::try_from(settings.retry_delay.as_millis()).unwrap_or(u64::MAX);
                parse_or_warn(&key, val, &mut ms);
                settings.retry_delay = Duration::from_millis(ms);
            }
            "chunk_size" => parse_at_least(&key, val, 1, &mut settings.chunk_size),
            "progress_step" => {
                let mut step = settings.progress_step;
                parse_at_least(&key, val, 1, &mut step);
                settings.progress_step = step.min(100);
            }
            "probe_timeout_secs" => {
                let mut secs = settings.probe_timeout.as_secs();
                parse_at_least(&key, val, 1, &mut secs);
                settings.probe_timeout = Duration::from_secs(secs);
            }
            "command_timeout_secs" => {
                let mut secs = settings.command_timeout.as_secs();
                parse_at_least(&key, val, 1, &mut secs);
                settings.command_timeout = Duration::from_secs(secs);
            }
            "max_output_bytes" => {
                parse_at_least(&key, val, 1024, &mut settings.max_output_bytes);
            }
            "terminal_write_attempts" => {
                parse_at_least(&key, val, 2, &mut settings.terminal_write_attempts);
            }
            _ => {}
        }
    }
}
