//! Integration tests for the installation coordinator.
//!
//! These tests drive full install runs against the mock backend and real
//! temporary directories:
//! 1. Packages are dropped as files and processed in name order
//! 2. Outcomes land as notifications, history artifacts, and state changes
//! 3. Shutdown, restart recovery, and concurrent invocations are exercised
//!    end to end

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use gantry_deployd::config::{Config, RestartTarget};
use gantry_deployd::coordinator::POST_STEP_RECORD_FILE;
use gantry_deployd::state::{MemoryStateStore, SqliteStateStore, StateStore};
use gantry_deployd::{Coordinator, MockBackend, MockOutcome, ShutdownFlag};
use gantry_types::{
    CompletionNotification, InstallStatus, InstallerState, PostStepDescriptor, RunOutcome,
};
use tempfile::TempDir;

fn test_config(tmp: &TempDir) -> Config {
    let package_source = tmp.path().join("packages");
    let history_root = tmp.path().join("history");
    fs::create_dir_all(&package_source).unwrap();
    fs::create_dir_all(&history_root).unwrap();

    Config {
        server_name: "web01".to_string(),
        package_source: package_source.clone(),
        history_root,
        state_db: tmp.path().join("state.db"),
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        restart_target: None,
        restart_marker: package_source.join("restart.marker"),
        update_config_files: false,
        app_config_dir: tmp.path().join("conf"),
        settle_delay: Duration::from_millis(5),
        quarantine_delay: Duration::from_millis(10),
        backend_cmd: None,
        log_level: "debug".to_string(),
    }
}

fn coordinator_with(
    config: &Config,
    store: &Arc<MemoryStateStore>,
    backend: &Arc<MockBackend>,
    shutdown: &ShutdownFlag,
) -> Coordinator {
    Coordinator::new(
        config.clone(),
        Arc::clone(store) as Arc<dyn StateStore>,
        Arc::clone(backend) as _,
        shutdown.clone(),
    )
}

fn drop_package(config: &Config, name: &str) {
    fs::write(config.package_source.join(name), b"package-bytes").unwrap();
}

fn read_notification(path: &Path) -> CompletionNotification {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// Find the history directory that holds an archived copy of `file_name`.
fn find_in_history(history_root: &Path, file_name: &str) -> Option<PathBuf> {
    for entry in fs::read_dir(history_root).ok()?.flatten() {
        let dir = entry.path();
        if dir.is_dir() && dir.join(file_name).exists() {
            return Some(dir);
        }
    }
    None
}

fn quarantined(source: &Path, package: &str) -> bool {
    let prefix = format!("{package}.error_");
    fs::read_dir(source)
        .map(|entries| {
            entries
                .flatten()
                .any(|e| e.file_name().to_string_lossy().starts_with(&prefix))
        })
        .unwrap_or(false)
}

async fn wait_for(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

#[tokio::test]
async fn test_install_success_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(MemoryStateStore::new());
    let backend = Arc::new(MockBackend::new(config.history_root.clone()));
    let coordinator = coordinator_with(&config, &store, &backend, &ShutdownFlag::new());

    drop_package(&config, "a.update");
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.installed, vec!["a.update".to_string()]);

    // The package drained from the drop folder into its history directory.
    assert!(!config.package_source.join("a.update").exists());
    let history = find_in_history(&config.history_root, "a.update").expect("archived package");
    assert!(history.join("Install.log").exists());
    assert!(history.join("messages.json").exists());

    let notification = read_notification(&config.package_source.join("a.json"));
    assert_eq!(notification.status, InstallStatus::Success);
    assert_eq!(notification.server_name, "web01");
    assert_eq!(notification.deploy_history_path, history.display().to_string());
    assert!(notification.log_lines.is_none());

    assert_eq!(
        store.installer_state("web01").unwrap(),
        InstallerState::Ready
    );
}

#[tokio::test]
async fn test_packages_process_in_name_order() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(MemoryStateStore::new());
    let backend = Arc::new(MockBackend::new(config.history_root.clone()));
    let coordinator = coordinator_with(&config, &store, &backend, &ShutdownFlag::new());

    // Dropped out of order on purpose.
    drop_package(&config, "c.update");
    drop_package(&config, "a.update");
    drop_package(&config, "b.update");

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.installed, vec!["a.update", "b.update", "c.update"]);
}

#[tokio::test]
async fn test_apply_failure_blocks_queue() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(MemoryStateStore::new());
    let backend = Arc::new(
        MockBackend::new(config.history_root.clone())
            .with_outcome("a.update", MockOutcome::FailApply),
    );
    let coordinator = coordinator_with(&config, &store, &backend, &ShutdownFlag::new());

    drop_package(&config, "a.update");
    drop_package(&config, "b.update");

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.failed_package.as_deref(), Some("a.update"));
    assert!(report.installed.is_empty());

    // The failure blocks everything behind it.
    assert!(config.package_source.join("b.update").exists());
    assert_eq!(backend.apply_calls(), 1);

    let notification = read_notification(&config.package_source.join("a.json"));
    assert_eq!(notification.status, InstallStatus::Fail);
    assert!(!notification.log_lines.unwrap().is_empty());

    // The lane is released; resolving the queue is up to the operator.
    assert_eq!(
        store.installer_state("web01").unwrap(),
        InstallerState::Ready
    );

    // Quarantine happens shortly afterwards on a detached task.
    assert!(
        wait_for(
            || quarantined(&config.package_source, "a.update"),
            Duration::from_secs(2)
        )
        .await
    );
    assert!(!config.package_source.join("a.update").exists());
}

#[tokio::test]
async fn test_early_failure_synthesizes_history() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(MemoryStateStore::new());
    let backend = Arc::new(
        MockBackend::new(config.history_root.clone())
            .with_outcome("a.update", MockOutcome::FailEarly),
    );
    let coordinator = coordinator_with(&config, &store, &backend, &ShutdownFlag::new());

    drop_package(&config, "a.update");
    let report = coordinator.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Failed);

    // The backend never created a history directory, so one was
    // synthesized for the audit trail.
    let fallback = fs::read_dir(&config.history_root)
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .find(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with("upgrade-failure-"))
                .unwrap_or(false)
        })
        .expect("synthesized history dir");
    assert!(fallback.join("messages.json").exists());
    assert!(fallback.join("Install.log").exists());

    let notification = read_notification(&config.package_source.join("a.json"));
    assert_eq!(notification.status, InstallStatus::Fail);
}

#[tokio::test]
async fn test_post_step_failure_quarantines_package() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(MemoryStateStore::new());
    let backend = Arc::new(
        MockBackend::new(config.history_root.clone())
            .with_outcome("a.update", MockOutcome::FailPostSteps),
    );
    let coordinator = coordinator_with(&config, &store, &backend, &ShutdownFlag::new());

    drop_package(&config, "a.update");
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(backend.apply_calls(), 1);
    assert_eq!(backend.post_step_calls(), 1);

    let notification = read_notification(&config.package_source.join("a.json"));
    assert_eq!(notification.status, InstallStatus::Fail);

    assert!(
        wait_for(
            || quarantined(&config.package_source, "a.update"),
            Duration::from_secs(2)
        )
        .await
    );
}

#[tokio::test]
async fn test_shutdown_after_apply_defers_post_steps() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(&tmp);
    let restart_file = tmp.path().join("restart-requested");
    config.restart_target = Some(RestartTarget::TouchFile(restart_file.clone()));

    let store = Arc::new(MemoryStateStore::new());
    let shutdown = ShutdownFlag::new();
    // The stop lands while the first package is mid-install: the hook runs
    // between apply and the coordinator's shutdown re-check.
    let observer = shutdown.clone();
    let backend = Arc::new(
        MockBackend::new(config.history_root.clone()).with_post_apply_hook(move |_| {
            observer.set();
        }),
    );
    let coordinator = coordinator_with(&config, &store, &backend, &shutdown);

    drop_package(&config, "a.update");
    drop_package(&config, "b.update");

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Deferred);
    assert_eq!(report.deferred_package.as_deref(), Some("a.update"));
    assert!(report.installed.is_empty());

    // Post-steps were not run; they are owed to the next startup.
    assert_eq!(backend.apply_calls(), 1);
    assert_eq!(backend.post_step_calls(), 0);

    let record_path = config.package_source.join(POST_STEP_RECORD_FILE);
    let descriptor: PostStepDescriptor =
        serde_json::from_str(&fs::read_to_string(&record_path).unwrap()).unwrap();
    assert_eq!(
        descriptor.post_step_package_filename,
        config.package_source.join("a.update")
    );
    assert!(descriptor.history_path.is_dir());
    assert_eq!(
        descriptor.result_file_name,
        config.package_source.join("a.json")
    );

    assert_eq!(
        store.installer_state("web01").unwrap(),
        InstallerState::WaitingForPostSteps
    );
    assert!(restart_file.exists());

    // No terminal outcome yet, so no notification either.
    assert!(!config.package_source.join("a.json").exists());

    // Further runs refuse to start over the unconsumed record.
    let second = coordinator.run().await.unwrap();
    assert_eq!(second.outcome, RunOutcome::Skipped);
    assert_eq!(backend.apply_calls(), 1);
}

#[tokio::test]
async fn test_startup_resume_finishes_deferred_work() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(MemoryStateStore::new());

    // First process: shutdown interrupts a.update after apply.
    let shutdown = ShutdownFlag::new();
    let observer = shutdown.clone();
    let backend = Arc::new(
        MockBackend::new(config.history_root.clone()).with_post_apply_hook(move |_| {
            observer.set();
        }),
    );
    let coordinator = coordinator_with(&config, &store, &backend, &shutdown);
    drop_package(&config, "a.update");
    drop_package(&config, "b.update");
    let report = coordinator.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Deferred);

    // Second process: fresh flag and backend, same store and folders.
    let backend = Arc::new(MockBackend::new(config.history_root.clone()));
    let coordinator = coordinator_with(&config, &store, &backend, &ShutdownFlag::new());

    coordinator.resume_deferred_post_steps().await.unwrap();

    assert!(!config.package_source.join(POST_STEP_RECORD_FILE).exists());
    assert_eq!(
        store.installer_state("web01").unwrap(),
        InstallerState::Ready
    );
    assert_eq!(backend.post_step_calls(), 1);

    let notification = read_notification(&config.package_source.join("a.json"));
    assert_eq!(notification.status, InstallStatus::Success);

    // The interrupted package finished and moved to history.
    assert!(!config.package_source.join("a.update").exists());
    assert!(find_in_history(&config.history_root, "a.update").is_some());

    // The queue moves again: b.update installs normally.
    let report = coordinator.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.installed, vec!["b.update"]);
}

#[tokio::test]
async fn test_resume_failure_still_consumes_record() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(MemoryStateStore::new());

    let history = config.history_root.join("a-20240101");
    fs::create_dir_all(&history).unwrap();
    drop_package(&config, "a.update");

    let descriptor = PostStepDescriptor {
        post_step_package_filename: config.package_source.join("a.update"),
        history_path: history.clone(),
        result_file_name: config.package_source.join("a.json"),
    };
    fs::write(
        config.package_source.join(POST_STEP_RECORD_FILE),
        serde_json::to_string_pretty(&descriptor).unwrap(),
    )
    .unwrap();
    store
        .set_installer_state("web01", InstallerState::WaitingForPostSteps)
        .unwrap();

    let backend = Arc::new(
        MockBackend::new(config.history_root.clone())
            .with_outcome("a.update", MockOutcome::FailPostSteps),
    );
    let coordinator = coordinator_with(&config, &store, &backend, &ShutdownFlag::new());

    coordinator.resume_deferred_post_steps().await.unwrap();

    // One bad package must not block every future startup.
    assert!(!config.package_source.join(POST_STEP_RECORD_FILE).exists());
    assert_eq!(
        store.installer_state("web01").unwrap(),
        InstallerState::Ready
    );

    let notification = read_notification(&config.package_source.join("a.json"));
    assert_eq!(notification.status, InstallStatus::Fail);
    assert!(!notification.log_lines.unwrap().is_empty());

    // The package stays put and gets a fresh attempt on the next run.
    assert!(config.package_source.join("a.update").exists());
}

#[tokio::test]
async fn test_concurrent_startups_resume_post_steps_once() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(MemoryStateStore::new());

    let history = config.history_root.join("a-20240101");
    fs::create_dir_all(&history).unwrap();
    drop_package(&config, "a.update");

    let descriptor = PostStepDescriptor {
        post_step_package_filename: config.package_source.join("a.update"),
        history_path: history.clone(),
        result_file_name: config.package_source.join("a.json"),
    };
    fs::write(
        config.package_source.join(POST_STEP_RECORD_FILE),
        serde_json::to_string_pretty(&descriptor).unwrap(),
    )
    .unwrap();
    store
        .set_installer_state("web01", InstallerState::WaitingForPostSteps)
        .unwrap();

    // Two processes come up over the same machine key and folders; the
    // slow post-step keeps the first mid-resume while the second checks in.
    let backend = Arc::new(
        MockBackend::new(config.history_root.clone())
            .with_post_step_delay(Duration::from_millis(100)),
    );
    let first = coordinator_with(&config, &store, &backend, &ShutdownFlag::new());
    let second = coordinator_with(&config, &store, &backend, &ShutdownFlag::new());

    let (a, b) = tokio::join!(
        first.resume_deferred_post_steps(),
        second.resume_deferred_post_steps()
    );
    a.unwrap();
    b.unwrap();

    // The late arrival saw the install in progress and backed off.
    assert_eq!(backend.post_step_calls(), 1);
    assert!(!config.package_source.join(POST_STEP_RECORD_FILE).exists());
    assert_eq!(
        store.installer_state("web01").unwrap(),
        InstallerState::Ready
    );
}

#[tokio::test]
async fn test_second_startup_without_record_proceeds_normally() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(MemoryStateStore::new());

    let history = config.history_root.join("a-20240101");
    fs::create_dir_all(&history).unwrap();
    drop_package(&config, "a.update");

    let descriptor = PostStepDescriptor {
        post_step_package_filename: config.package_source.join("a.update"),
        history_path: history.clone(),
        result_file_name: config.package_source.join("a.json"),
    };
    fs::write(
        config.package_source.join(POST_STEP_RECORD_FILE),
        serde_json::to_string_pretty(&descriptor).unwrap(),
    )
    .unwrap();
    store
        .set_installer_state("web01", InstallerState::WaitingForPostSteps)
        .unwrap();

    let backend = Arc::new(MockBackend::new(config.history_root.clone()));
    let coordinator = coordinator_with(&config, &store, &backend, &ShutdownFlag::new());

    coordinator.resume_deferred_post_steps().await.unwrap();
    assert_eq!(backend.post_step_calls(), 1);

    // A restart after the record is consumed finds nothing to resume.
    coordinator.resume_deferred_post_steps().await.unwrap();
    assert_eq!(backend.post_step_calls(), 1);
    assert_eq!(
        store.installer_state("web01").unwrap(),
        InstallerState::Ready
    );

    // And the queue moves normally afterwards.
    drop_package(&config, "b.update");
    let report = coordinator.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.installed, vec!["b.update"]);
}

#[tokio::test]
async fn test_corrupt_record_is_discarded() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(MemoryStateStore::new());
    fs::write(
        config.package_source.join(POST_STEP_RECORD_FILE),
        b"not json",
    )
    .unwrap();
    store
        .set_installer_state("web01", InstallerState::WaitingForPostSteps)
        .unwrap();

    let backend = Arc::new(MockBackend::new(config.history_root.clone()));
    let coordinator = coordinator_with(&config, &store, &backend, &ShutdownFlag::new());

    coordinator.resume_deferred_post_steps().await.unwrap();

    assert!(!config.package_source.join(POST_STEP_RECORD_FILE).exists());
    assert_eq!(
        store.installer_state("web01").unwrap(),
        InstallerState::Ready
    );
    assert_eq!(backend.post_step_calls(), 0);
}

#[tokio::test]
async fn test_record_blocks_runs_until_consumed() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(MemoryStateStore::new());
    let backend = Arc::new(MockBackend::new(config.history_root.clone()));
    let coordinator = coordinator_with(&config, &store, &backend, &ShutdownFlag::new());

    fs::write(config.package_source.join(POST_STEP_RECORD_FILE), b"{}").unwrap();
    drop_package(&config, "a.update");

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Skipped);
    assert_eq!(backend.apply_calls(), 0);
    assert!(config.package_source.join("a.update").exists());
}

#[tokio::test]
async fn test_lane_held_by_another_instance_skips() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);

    // Two server processes sharing one state file.
    let db = config.state_db.clone();
    let theirs = SqliteStateStore::open(&db).unwrap();
    let ours = Arc::new(SqliteStateStore::open(&db).unwrap());

    theirs
        .set_installer_state("web01", InstallerState::InstallingPackage)
        .unwrap();

    let backend = Arc::new(MockBackend::new(config.history_root.clone()));
    let coordinator = Coordinator::new(
        config.clone(),
        ours as Arc<dyn StateStore>,
        Arc::clone(&backend) as _,
        ShutdownFlag::new(),
    );

    drop_package(&config, "a.update");
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Skipped);
    assert!(report
        .skip_reason
        .unwrap()
        .contains("installing_package"));
    assert_eq!(backend.apply_calls(), 0);
    assert!(config.package_source.join("a.update").exists());
}

#[tokio::test]
async fn test_overlapping_invocations_one_wins() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(MemoryStateStore::new());
    let backend = Arc::new(
        MockBackend::new(config.history_root.clone())
            .with_apply_delay(Duration::from_millis(150)),
    );
    let coordinator = Arc::new(coordinator_with(&config, &store, &backend, &ShutdownFlag::new()));

    drop_package(&config, "a.update");

    let first = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.run().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The second invocation bounces off the persisted state.
    let second = coordinator.run().await.unwrap();
    assert_eq!(second.outcome, RunOutcome::Skipped);

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.outcome, RunOutcome::Completed);
    assert_eq!(backend.apply_calls(), 1);
}

#[tokio::test]
async fn test_restart_marker_forces_lane_open() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(MemoryStateStore::new());

    // The previous process died mid-run: stale state, marker on disk.
    store
        .set_installer_state("web01", InstallerState::InstallingPackage)
        .unwrap();
    fs::write(&config.restart_marker, b"").unwrap();

    let backend = Arc::new(MockBackend::new(config.history_root.clone()));
    let coordinator = coordinator_with(&config, &store, &backend, &ShutdownFlag::new());

    coordinator.recover_from_restart_marker();

    assert!(!config.restart_marker.exists());
    assert_eq!(
        store.installer_state("web01").unwrap(),
        InstallerState::Ready
    );

    // And the queue moves again.
    drop_package(&config, "a.update");
    let report = coordinator.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn test_shutdown_before_first_package_aborts() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(MemoryStateStore::new());
    let backend = Arc::new(MockBackend::new(config.history_root.clone()));
    let shutdown = ShutdownFlag::new();
    let coordinator = coordinator_with(&config, &store, &backend, &shutdown);

    drop_package(&config, "a.update");
    shutdown.set();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Aborted);
    assert_eq!(backend.apply_calls(), 0);
    assert_eq!(
        store.installer_state("web01").unwrap(),
        InstallerState::Ready
    );
}

#[tokio::test]
async fn test_config_files_replaced_after_install() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(&tmp);
    config.update_config_files = true;
    fs::create_dir_all(&config.app_config_dir).unwrap();
    let nested = config.app_config_dir.join("include");
    fs::create_dir_all(&nested).unwrap();

    fs::write(config.app_config_dir.join("app.conf"), "old").unwrap();
    fs::write(config.app_config_dir.join("app.conf.site-2"), "new").unwrap();
    // Staged file without a live counterpart just lands in place.
    fs::write(nested.join("db.conf.site-2"), "db-new").unwrap();

    let store = Arc::new(MemoryStateStore::new());
    let backend = Arc::new(MockBackend::new(config.history_root.clone()));
    let coordinator = coordinator_with(&config, &store, &backend, &ShutdownFlag::new());

    drop_package(&config, "site-2.update");
    let report = coordinator.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);

    assert_eq!(
        fs::read_to_string(config.app_config_dir.join("app.conf")).unwrap(),
        "new"
    );
    assert!(!config.app_config_dir.join("app.conf.site-2").exists());
    assert_eq!(fs::read_to_string(nested.join("db.conf")).unwrap(), "db-new");

    // The old live file survives as a timestamped backup.
    let backup = fs::read_dir(&config.app_config_dir)
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .find(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with("app.conf.site-2.backup"))
                .unwrap_or(false)
        })
        .expect("backup of the live config");
    assert_eq!(fs::read_to_string(backup).unwrap(), "old");
}

#[tokio::test]
async fn test_empty_source_completes_quietly() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(MemoryStateStore::new());
    let backend = Arc::new(MockBackend::new(config.history_root.clone()));
    let coordinator = coordinator_with(&config, &store, &backend, &ShutdownFlag::new());

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert!(report.installed.is_empty());
    assert_eq!(backend.apply_calls(), 0);
}
