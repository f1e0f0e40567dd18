use std::env;
use std::path::{Path, PathBuf};

/// Environment variable that pins the config directory.
pub const CONFIG_DIR_ENV: &str = "INSTALLD_CONFIG_DIR";

/// Resolve an XDG base directory from environment or default to `$HOME` + segments.
///
/// Inputs:
/// - `var`: Environment variable to check (e.g., `XDG_CONFIG_HOME`).
/// - `home_default`: Fallback path segments relative to `$HOME` if `var` is unset/empty.
///
/// Output: Resolved base directory path.
fn xdg_base_dir(var: &str, home_default: &[&str]) -> PathBuf {
    if let Ok(p) = env::var(var)
        && !p.trim().is_empty()
    {
        return PathBuf::from(p);
    }
    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let mut base = PathBuf::from(home);
    for seg in home_default {
        base = base.join(seg);
    }
    base
}

/// `$HOME/.config/installd` when HOME is set and the directory can be created.
fn home_config_dir() -> Option<PathBuf> {
    let home = env::var("HOME").ok()?;
    let dir = Path::new(&home).join(".config").join("installd");
    std::fs::create_dir_all(&dir).ok().map(|()| dir)
}

/// What: Config directory for installd (ensured to exist when possible).
///
/// Inputs:
/// - `explicit`: Directory given on the command line; wins over everything.
///
/// Output:
/// - The first of `explicit`, `$INSTALLD_CONFIG_DIR`, `$HOME/.config/installd`,
///   `$XDG_CONFIG_HOME/installd`.
#[must_use]
pub fn config_dir(explicit: Option<&Path>) -> PathBuf {
    let pinned = explicit.map(Path::to_path_buf).or_else(|| {
        env::var(CONFIG_DIR_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    });
    if let Some(dir) = pinned {
        let _ = std::fs::create_dir_all(&dir);
        return dir;
    }
    if let Some(dir) = home_config_dir() {
        return dir;
    }
    let dir = xdg_base_dir("XDG_CONFIG_HOME", &[".config"]).join("installd");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

/// Logs directory under the config dir (ensured to exist).
#[must_use]
pub fn logs_dir(config_dir: &Path) -> PathBuf {
    let dir = config_dir.join("logs");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

/// Path of `settings.conf` under the config dir.
#[must_use]
pub fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join("settings.conf")
}

/// Resolve `value` against `config_dir` unless it is absolute.
#[must_use]
pub fn resolve_relative(config_dir: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        config_dir.join(path)
    }
}
