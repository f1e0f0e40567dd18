//! installd binary entrypoint kept minimal. The runtime lives in `installd::app`.

use std::fmt;
use std::path::Path;
use std::process::ExitCode;
use std::sync::OnceLock;

use clap::Parser;
use installd::args::{Args, determine_log_level};
use installd::{app, config};

struct InstalldTimer;

impl tracing_subscriber::fmt::time::FormatTime for InstalldTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        write!(w, "{}", chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"))
    }
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Log to `<config>/logs/installd.log`, or to stderr when the file cannot be opened.
fn init_logging(config_dir: &Path, level: &str) {
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
    };
    let mut log_path = config::logs_dir(config_dir);
    log_path.push("installd.log");
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_timer(InstalldTimer)
                .init();
            let _ = LOG_GUARD.set(guard);
            tracing::info!(path = %log_path.display(), "logging initialized");
        }
        Err(e) => {
            // Fallback: stderr logger so startup is not blocked
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::io::stderr)
                .with_timer(InstalldTimer)
                .init();
            tracing::warn!(error = %e, "failed to open log file; using stderr");
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config_dir = config::config_dir(args.config_dir.as_deref());
    init_logging(&config_dir, &determine_log_level(&args));

    tracing::info!(config = %config_dir.display(), "installd starting");
    let code = match app::run(args, &config_dir).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!(error = ?err, "installd error");
            eprintln!("installd: {err:#}");
            ExitCode::FAILURE
        }
    };
    tracing::info!("installd exited");
    code
}
