//! End-to-end batch scenarios through the install manager.

use std::time::Duration;

use installd::install::{CANCELLED_MESSAGE, InstallRequest, StartError};
use installd::platform::Platform;
use installd::store::{InstallStatus, RecordStore};

use super::helpers::{
    FakeSpawner, LIST, USER, apps, fast_policy, harness, harness_with, linux_apps, wait_terminal,
};

fn request(password: &str) -> InstallRequest {
    InstallRequest {
        user_id: USER.to_string(),
        device_id: Some("laptop".to_string()),
        list_id: LIST.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
/// What: Three valid apps install in order and the batch completes.
///
/// Inputs:
/// - Linux host, three apps, accepted password.
///
/// Output:
/// - Record `completed` with progress 100, no error, and one probe before the installs.
async fn batch_three_apps_complete() {
    let h = harness(Platform::Linux, linux_apps(3), FakeSpawner::new(true));
    let started = h.manager.begin(request("hunter2")).await.expect("begin");
    assert_eq!(started.total_apps, 3);

    let rec = wait_terminal(&h.store, started.id).await;
    assert_eq!(rec.status, InstallStatus::Completed);
    assert_eq!(rec.progress, 100);
    assert!(rec.error.is_none());
    assert!(rec.ended_at.is_some());
    assert_eq!(h.spawner.commands(), vec!["install 1", "install 2", "install 3"]);
    assert_eq!(h.spawner.probes(), 1);
}

#[tokio::test]
/// What: The first app failing on every attempt stops the batch.
///
/// Inputs:
/// - App 2 fails with a package-manager error on all three attempts.
///
/// Output:
/// - Record `failed` with app 2's stderr, progress reflecting app 1, app 3 never run.
async fn batch_failure_stops_remaining_apps() {
    let spawner = FakeSpawner::new(true).failing("install 2", "E: Unable to locate package two");
    let h = harness(Platform::Linux, linux_apps(3), spawner);
    let started = h.manager.begin(request("hunter2")).await.expect("begin");

    let rec = wait_terminal(&h.store, started.id).await;
    assert_eq!(rec.status, InstallStatus::Failed);
    assert_eq!(rec.error.as_deref(), Some("E: Unable to locate package two"));
    assert_eq!(rec.progress, 33);
    assert_eq!(
        h.spawner.commands(),
        vec!["install 1", "install 2", "install 2", "install 2"]
    );
}

#[tokio::test]
/// What: On macOS a failing primary command falls back to the alternative.
///
/// Inputs:
/// - `brew install --cask foo || hdiutil attach foo.dmg` where brew fails.
///
/// Output:
/// - Both alternatives run once and the batch completes.
async fn batch_macos_fallback_completes() {
    let spawner = FakeSpawner::new(true).failing("brew install --cask foo", "Error: cask not found");
    let h = harness(
        Platform::Macos,
        apps(&[r#"{"macos": "brew install --cask foo || hdiutil attach foo.dmg"}"#]),
        spawner,
    );
    let started = h.manager.begin(request("hunter2")).await.expect("begin");

    let rec = wait_terminal(&h.store, started.id).await;
    assert_eq!(rec.status, InstallStatus::Completed);
    assert_eq!(
        h.spawner.commands(),
        vec!["brew install --cask foo", "hdiutil attach foo.dmg"]
    );
}

#[tokio::test]
/// What: A cancel issued while app 2 runs takes effect before app 3.
///
/// Inputs:
/// - App 2 blocks until released; cancel is requested while it blocks.
///
/// Output:
/// - App 2 finishes, app 3 never starts, record `failed` with the cancel text.
async fn batch_cancel_between_apps() {
    let h = harness(
        Platform::Linux,
        linux_apps(3),
        FakeSpawner::new(true).gated("install 2"),
    );
    let started = h.manager.begin(request("hunter2")).await.expect("begin");

    tokio::time::timeout(Duration::from_secs(5), h.spawner.gate().entered.notified())
        .await
        .expect("app 2 started");
    assert!(h.manager.is_active(started.id));
    assert!(h.manager.cancel(started.id, USER).await.expect("cancel"));
    assert!(!h.manager.is_active(started.id));
    h.spawner.gate().release.notify_one();

    let rec = wait_terminal(&h.store, started.id).await;
    assert_eq!(rec.status, InstallStatus::Failed);
    assert_eq!(rec.error.as_deref(), Some(CANCELLED_MESSAGE));
    assert_eq!(rec.progress, 67);
    assert!(rec.cancel_requested);
    assert_eq!(h.spawner.commands(), vec!["install 1", "install 2"]);
}

#[tokio::test]
/// What: A rejected password never touches an app.
///
/// Output:
/// - `InvalidPassword`, one probe, zero install processes, no record.
async fn batch_invalid_password_spawns_no_installs() {
    let h = harness(Platform::Linux, linux_apps(2), FakeSpawner::new(false));
    let err = h.manager.begin(request("wrong")).await.expect_err("rejected");
    assert!(matches!(err, StartError::InvalidPassword));
    assert_eq!(h.spawner.probes(), 1);
    assert!(h.spawner.commands().is_empty());
    assert_eq!(h.store.len().await, 0);
}

#[tokio::test]
/// What: Large batches write a bounded, increasing series of progress values.
///
/// Inputs:
/// - 230 apps, default chunking and step.
///
/// Output:
/// - Fewer than ten intermediate writes, strictly increasing, all below 100;
///   final record at 100.
async fn batch_large_progress_writes_are_bounded() {
    let h = harness(Platform::Linux, linux_apps(230), FakeSpawner::new(true));
    let started = h.manager.begin(request("hunter2")).await.expect("begin");

    let rec = wait_terminal(&h.store, started.id).await;
    assert_eq!(rec.status, InstallStatus::Completed);
    assert_eq!(rec.progress, 100);
    let writes = h.store.progress_writes(started.id);
    assert!(writes.len() < 10, "writes: {writes:?}");
    assert!(writes.windows(2).all(|w| w[0] < w[1]));
    assert!(writes.iter().all(|p| *p < 100));
    assert_eq!(h.spawner.commands().len(), 230);
}

#[tokio::test]
/// What: Dry runs validate the password but spawn no install commands.
async fn batch_dry_run_completes_without_installs() {
    let policy = installd::install::ExecPolicy {
        dry_run: true,
        ..fast_policy(Platform::Linux)
    };
    let h = harness_with(Platform::Linux, linux_apps(2), FakeSpawner::new(true), policy);
    let started = h.manager.begin(request("hunter2")).await.expect("begin");

    let rec = wait_terminal(&h.store, started.id).await;
    assert_eq!(rec.status, InstallStatus::Completed);
    assert_eq!(h.spawner.probes(), 1);
    assert!(h.spawner.commands().is_empty());
}

#[tokio::test]
/// What: Concurrent batches run independently.
async fn batch_concurrent_batches_both_finish() {
    let h = harness(Platform::Linux, linux_apps(4), FakeSpawner::new(true));
    let first = h.manager.begin(request("hunter2")).await.expect("first");
    let second = h.manager.begin(request("hunter2")).await.expect("second");
    assert_ne!(first.id, second.id);

    for id in [first.id, second.id] {
        let rec = wait_terminal(&h.store, id).await;
        assert_eq!(rec.status, InstallStatus::Completed);
    }
    assert_eq!(h.spawner.commands().len(), 8);
    let stored = h.store.get(first.id).await.expect("get").expect("record");
    assert_eq!(stored.device_id.as_deref(), Some("laptop"));
}
