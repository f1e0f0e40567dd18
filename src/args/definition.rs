//! Command-line argument definition.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// installd - install batches of apps on this host and report progress over HTTP
#[derive(Parser, Debug)]
#[command(name = "installd")]
#[command(version)]
#[command(about = "Install batches of apps on this host and report progress over HTTP", long_about = None)]
pub struct Args {
    /// Configuration directory (default: $INSTALLD_CONFIG_DIR or ~/.config/installd)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Address to listen on, overriding `bind` in settings.conf
    #[arg(long, global = true)]
    pub bind: Option<SocketAddr>,

    /// Log install commands instead of running them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Set the logging level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Enable verbose output (equivalent to --log-level debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// What to do; defaults to `serve`
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Prompt for the elevation password and check it with a no-op probe
    CheckPassword,
    /// Print the command a template resolves to
    Resolve {
        /// Template text, e.g. '{"linux": "apt-get install -y git"}'
        template: String,
        /// Platform tag to resolve for (windows, macos, linux); defaults to this host
        #[arg(long)]
        platform: Option<String>,
    },
}

impl Args {
    /// Selected subcommand, `serve` when none was given.
    #[must_use]
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}
