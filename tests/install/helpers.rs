//! Helpers for install integration tests.
//!
//! This module provides:
//! - A fake `Spawner` that answers elevation probes and install commands from rules
//! - A store wrapper that records every progress write
//! - A harness wiring catalog, store, runner and manager the way the daemon does

#![cfg(test)]
// Not every test file uses every helper
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use installd::catalog::{AppInstallDescriptor, AppList, FileCatalog};
use installd::install::{
    ActiveSet, BatchPolicy, BatchRunner, ExecPolicy, Executor, InstallManager, Invocation,
    ProcessOutput, SpawnError, Spawner,
};
use installd::logic::password::ElevationProbe;
use installd::platform::Platform;
use installd::store::{
    BatchId, InstallationRecord, MemoryStore, NewInstallation, RecordStore, StoreError,
};
use installd::template::RawTemplate;
use tokio::sync::Notify;

/// Owner of the test list.
pub const USER: &str = "u1";
/// Id of the test list.
pub const LIST: &str = "dev-tools";

/// What: Install command carried by an invocation.
///
/// Output:
/// - The `bash -c` argument for install invocations, `None` for probes.
pub fn command_of(inv: &Invocation) -> Option<&str> {
    if inv.program == "bash" || inv.args.iter().any(|a| a == "bash") {
        inv.args.last().map(String::as_str)
    } else {
        None
    }
}

/// Fake spawner with scripted failures and an optional gate.
pub struct FakeSpawner {
    calls: Mutex<Vec<Invocation>>,
    accept_password: bool,
    failing: Vec<(String, String)>,
    gate: Option<Gate>,
}

/// Blocks one command until released.
pub struct Gate {
    command: String,
    /// Signalled when the gated command starts.
    pub entered: Notify,
    /// Notify to let the gated command finish.
    pub release: Notify,
}

impl FakeSpawner {
    /// Every command succeeds; probes answer `accept_password`.
    pub fn new(accept_password: bool) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            accept_password,
            failing: Vec::new(),
            gate: None,
        }
    }

    /// `command` fails with `stderr` on every attempt.
    #[must_use]
    pub fn failing(mut self, command: &str, stderr: &str) -> Self {
        self.failing.push((command.to_string(), stderr.to_string()));
        self
    }

    /// `command` blocks after starting until the gate is released.
    #[must_use]
    pub fn gated(mut self, command: &str) -> Self {
        self.gate = Some(Gate {
            command: command.to_string(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        self
    }

    /// The gate configured by [`FakeSpawner::gated`].
    pub fn gate(&self) -> &Gate {
        self.gate.as_ref().expect("spawner has no gate")
    }

    /// Install commands run so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .filter_map(command_of)
            .map(str::to_string)
            .collect()
    }

    /// Elevation probes run so far.
    pub fn probes(&self) -> usize {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .filter(|inv| command_of(inv).is_none())
            .count()
    }
}

#[async_trait]
impl Spawner for FakeSpawner {
    async fn run(&self, invocation: Invocation) -> Result<ProcessOutput, SpawnError> {
        self.calls.lock().expect("calls").push(invocation.clone());
        let Some(command) = command_of(&invocation).map(str::to_string) else {
            return Ok(ProcessOutput {
                code: Some(if self.accept_password { 0 } else { 1 }),
                stdout: String::new(),
                stderr: if self.accept_password {
                    String::new()
                } else {
                    "Sorry, try again.".to_string()
                },
            });
        };
        if let Some(gate) = &self.gate
            && gate.command == command
        {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if let Some((_, stderr)) = self.failing.iter().find(|(c, _)| *c == command) {
            return Ok(ProcessOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: stderr.clone(),
            });
        }
        Ok(ProcessOutput {
            code: Some(0),
            stdout: format!("installed via {command}"),
            stderr: String::new(),
        })
    }
}

/// Memory store that records every progress value written.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    progress: Mutex<Vec<(BatchId, u8)>>,
}

impl CountingStore {
    /// Progress values written for `id`, in order.
    pub fn progress_writes(&self, id: BatchId) -> Vec<u8> {
        self.progress
            .lock()
            .expect("progress")
            .iter()
            .filter(|(b, _)| *b == id)
            .map(|(_, p)| *p)
            .collect()
    }

    /// Number of records created.
    pub async fn len(&self) -> usize {
        self.inner.len().await
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn create(&self, new: NewInstallation) -> Result<BatchId, StoreError> {
        self.inner.create(new).await
    }

    async fn get(&self, id: BatchId) -> Result<Option<InstallationRecord>, StoreError> {
        self.inner.get(id).await
    }

    async fn mark_installing(&self, id: BatchId, apps_count: usize) -> Result<(), StoreError> {
        self.inner.mark_installing(id, apps_count).await
    }

    async fn update_progress(&self, id: BatchId, progress: u8) -> Result<(), StoreError> {
        self.progress.lock().expect("progress").push((id, progress));
        self.inner.update_progress(id, progress).await
    }

    async fn mark_failed(&self, id: BatchId, error: &str) -> Result<(), StoreError> {
        self.inner.mark_failed(id, error).await
    }

    async fn mark_completed(&self, id: BatchId) -> Result<(), StoreError> {
        self.inner.mark_completed(id).await
    }

    async fn request_cancel(&self, id: BatchId) -> Result<bool, StoreError> {
        self.inner.request_cancel(id).await
    }
}

/// Wired manager plus handles on its fakes.
pub struct Harness {
    /// Coordinator under test.
    pub manager: Arc<InstallManager>,
    /// Record store behind it.
    pub store: Arc<CountingStore>,
    /// Spawner behind the probe and executor.
    pub spawner: Arc<FakeSpawner>,
}

/// One app per `(id, template)` pair.
pub fn apps(templates: &[&str]) -> Vec<AppInstallDescriptor> {
    templates
        .iter()
        .zip(1_u64..)
        .map(|(t, id)| AppInstallDescriptor {
            id,
            name: format!("app{id}"),
            install_command: Some(RawTemplate::from(*t)),
        })
        .collect()
}

/// `n` Linux apps with commands `install 1` .. `install n`.
pub fn linux_apps(n: usize) -> Vec<AppInstallDescriptor> {
    (1..=n)
        .map(|i| AppInstallDescriptor {
            id: u64::try_from(i).expect("app id"),
            name: format!("app{i}"),
            install_command: Some(RawTemplate::from(format!(r#"{{"linux": "install {i}"}}"#))),
        })
        .collect()
}

/// What: Build a manager over `apps` the way the daemon wires it.
///
/// Inputs:
/// - `platform`: Host platform to emulate.
/// - `apps`: Contents of list [`LIST`] owned by [`USER`].
/// - `spawner`: Fake process layer.
/// - `exec`: Executor policy (retry delays should be short).
pub fn harness_with(
    platform: Platform,
    apps: Vec<AppInstallDescriptor>,
    spawner: FakeSpawner,
    exec: ExecPolicy,
) -> Harness {
    let catalog = Arc::new(FileCatalog::new(vec![AppList {
        id: LIST.to_string(),
        owner: USER.to_string(),
        apps,
    }]));
    let store = Arc::new(CountingStore::default());
    let spawner = Arc::new(spawner);
    let validator = Arc::new(ElevationProbe::new(
        spawner.clone(),
        platform,
        Duration::from_secs(5),
    ));
    let executor = Arc::new(Executor::new(spawner.clone(), platform, exec));
    let active = Arc::new(ActiveSet::default());
    let runner = Arc::new(BatchRunner::new(
        store.clone(),
        executor,
        active.clone(),
        platform,
        BatchPolicy::default(),
    ));
    let manager = Arc::new(InstallManager::new(
        catalog,
        store.clone(),
        validator,
        runner,
        active,
        platform,
    ));
    Harness {
        manager,
        store,
        spawner,
    }
}

/// [`harness_with`] using a fast retry policy.
pub fn harness(platform: Platform, apps: Vec<AppInstallDescriptor>, spawner: FakeSpawner) -> Harness {
    harness_with(platform, apps, spawner, fast_policy(platform))
}

/// Platform defaults with a 1 ms retry delay.
pub fn fast_policy(platform: Platform) -> ExecPolicy {
    ExecPolicy {
        retry_delay: Duration::from_millis(1),
        ..ExecPolicy::for_platform(platform)
    }
}

/// What: Poll until the record reaches a terminal status.
///
/// Details:
/// - Panics after about five seconds.
pub async fn wait_terminal(store: &CountingStore, id: BatchId) -> InstallationRecord {
    for _ in 0..500 {
        if let Some(rec) = store.get(id).await.expect("get")
            && rec.status.is_terminal()
        {
            return rec;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("installation {id} did not reach a terminal status");
}
