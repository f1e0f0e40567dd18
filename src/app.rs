//! Runtime wiring: settings, collaborators, and the subcommands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::args::{Args, Command};
use crate::catalog::{AppCatalog, FileCatalog};
use crate::config::{self, Settings, StoreKind};
use crate::install::{ActiveSet, BatchRunner, Executor, InstallManager, Spawner, SystemSpawner};
use crate::logic::password::{Credential, CredentialValidator, ElevationProbe};
use crate::platform::Platform;
use crate::server::{self, AppState};
use crate::store::{FileStore, MemoryStore, RecordStore};
use crate::template::{self, RawTemplate};

/// What: Run the selected subcommand.
///
/// Inputs:
/// - `args`: Parsed command line.
/// - `config_dir`: Resolved configuration directory.
///
/// Output:
/// - `Ok(true)` on success, `Ok(false)` when the command ran but its answer
///   was negative (rejected password, unresolvable template).
///
/// # Errors
/// - Settings, catalog or store loading failures, and server errors.
pub async fn run(args: Args, config_dir: &Path) -> Result<bool> {
    let platform = Platform::current();
    let mut settings = config::load(config_dir, platform)?;
    if let Some(bind) = args.bind {
        settings.bind = bind;
    }
    if args.dry_run {
        settings.dry_run = true;
    }

    match args.command() {
        Command::Serve => {
            serve(&settings, platform).await?;
            Ok(true)
        }
        Command::CheckPassword => check_password(&settings, platform).await,
        Command::Resolve { template, platform: tag } => {
            let platform = tag.as_deref().map_or(platform, Platform::from_os);
            Ok(print_resolved(template, platform))
        }
    }
}

/// What: Assemble the install manager from settings.
///
/// Inputs:
/// - `settings`: Effective settings.
/// - `platform`: Host platform.
/// - `spawner`: Process spawner shared by the probe and the executor.
///
/// Output:
/// - A ready `InstallManager`.
///
/// # Errors
/// - The catalog file exists but is invalid, or the record file is unreadable.
pub fn build_manager(
    settings: &Settings,
    platform: Platform,
    spawner: Arc<dyn Spawner>,
) -> Result<Arc<InstallManager>> {
    let catalog: Arc<dyn AppCatalog> = Arc::new(load_catalog(&settings.catalog_path)?);
    let store: Arc<dyn RecordStore> = match settings.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::File => Arc::new(
            FileStore::open(&settings.store_path).context("failed to open installation store")?,
        ),
    };
    let validator: Arc<dyn CredentialValidator> = Arc::new(ElevationProbe::new(
        Arc::clone(&spawner),
        platform,
        settings.probe_timeout,
    ));
    let executor = Arc::new(Executor::new(spawner, platform, settings.exec_policy()));
    let active = Arc::new(ActiveSet::default());
    let runner = Arc::new(BatchRunner::new(
        Arc::clone(&store),
        executor,
        Arc::clone(&active),
        platform,
        settings.batch_policy(),
    ));
    Ok(Arc::new(InstallManager::new(
        catalog, store, validator, runner, active, platform,
    )))
}

/// A missing catalog yields an empty one so the daemon still starts.
fn load_catalog(path: &Path) -> Result<FileCatalog> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "catalog file not found; no lists available");
        return Ok(FileCatalog::default());
    }
    FileCatalog::load(path).context("failed to load app catalog")
}

async fn serve(settings: &Settings, platform: Platform) -> Result<()> {
    let spawner: Arc<dyn Spawner> = Arc::new(SystemSpawner);
    let manager = build_manager(settings, platform, spawner)?;
    tracing::info!(
        platform = %platform,
        dry_run = settings.dry_run,
        store = ?settings.store,
        "installd starting"
    );
    let state = AppState::new(manager, settings.api_token.clone());
    server::serve(state, settings.bind).await
}

async fn check_password(settings: &Settings, platform: Platform) -> Result<bool> {
    let secret = tokio::task::spawn_blocking(|| rpassword::prompt_password("[installd] elevation password: "))
        .await
        .context("password prompt task failed")?
        .context("failed to read password")?;
    let credential = match Credential::new(secret) {
        Ok(c) => c,
        Err(err) => {
            println!("{err}");
            return Ok(false);
        }
    };
    let probe = ElevationProbe::new(Arc::new(SystemSpawner), platform, settings.probe_timeout);
    let ok = probe.validate(&credential).await;
    println!("{}", if ok { "password accepted" } else { "password rejected" });
    Ok(ok)
}

fn print_resolved(template: String, platform: Platform) -> bool {
    match template::resolve(&RawTemplate::from(template), platform) {
        Ok(command) => {
            println!("{command}");
            for (i, alt) in template::split_fallback(&command).iter().enumerate().skip(1) {
                println!("  fallback {i}: {alt}");
            }
            true
        }
        Err(err) => {
            eprintln!("{err}");
            false
        }
    }
}
