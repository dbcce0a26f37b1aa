//! End-to-end runs of the install pipeline against fake processes

mod common;

use std::time::Duration;

use common::{finish, harness, log_line, start};
use subi_errors::{Error, InstallError, PlatformError};
use subi_events::{AppEvent, GeneralEvent};
use subi_install::{InstallOutcome, ProgressSink, ERROR_STATUS_TEXT};
use subi_platform::InstallLock;
use subi_types::{InstallState, Status, StatusKind};

#[tokio::test]
async fn successful_install_walks_every_state() {
    let h = harness(false, |_, _, model| {
        model.install_ssh_server = true;
        model.packages = vec!["vim".to_string()];
    });
    h.process.on_install(vec![
        start("cmd-install", "curtin command install"),
        start("cmd-install/stage-partitioning", "configuring storage"),
        log_line("creating partition 1"),
        finish("cmd-install/stage-partitioning", "SUCCESS"),
        finish("cmd-install", "SUCCESS"),
    ]);

    let outcome = h.controller.install().await.unwrap();

    assert_eq!(outcome, InstallOutcome::Completed);
    assert_eq!(
        h.sink.states(),
        vec![
            InstallState::NeedsConfirmation,
            InstallState::Running,
            InstallState::PostWait,
            InstallState::PostRunning,
            InstallState::UuRunning,
            InstallState::Done,
        ]
    );
    assert_eq!(h.controller.install_state(), InstallState::Done);
    assert_eq!(h.sink.open_count(), 0);
    assert!(h.controller.crash_report().is_none());
    assert!(h
        .sink
        .lines
        .lock()
        .unwrap()
        .contains(&"creating partition 1".to_string()));
}

#[tokio::test]
async fn install_tool_steps_nest_under_the_install_context() {
    let h = harness(false, |_, _, _| {});
    h.process.on_install(vec![
        start("cmd-install", "curtin command install"),
        start("cmd-install/stage-partitioning", "configuring storage"),
        finish("cmd-install/stage-partitioning", "WARN"),
        finish("cmd-install", "SUCCESS"),
    ]);

    h.controller.install().await.unwrap();

    let (system, system_parent) = h.sink.started_entry("installing system").unwrap();
    // the tree root is never shown
    assert_eq!(system_parent, None);
    let (cmd, cmd_parent) = h.sink.started_entry("curtin command install").unwrap();
    assert_eq!(cmd_parent, Some(system));
    let (storage, storage_parent) = h.sink.started_entry("configuring storage").unwrap();
    assert_eq!(storage_parent, Some(cmd));

    // a parent reports the worst status of its children
    assert_eq!(h.sink.finish_of(storage), vec![Some(Status::Warn)]);
    assert_eq!(h.sink.finish_of(cmd), vec![Some(Status::Warn)]);
    assert_eq!(h.sink.finish_of(system), vec![Some(Status::Warn)]);
}

#[tokio::test]
async fn unknown_finish_is_ignored() {
    let h = harness(false, |_, _, _| {});
    h.process.on_install(vec![
        finish("cmd-never-started", "FAIL"),
        start("cmd-install", "curtin command install"),
        finish("cmd-install", "SUCCESS"),
    ]);

    let outcome = h.controller.install().await.unwrap();

    assert_eq!(outcome, InstallOutcome::Completed);
    let finished = h.sink.finished.lock().unwrap().clone();
    assert!(finished.iter().all(|(_, status)| *status != Some(Status::Error)));
}

#[tokio::test]
async fn commands_run_in_pipeline_order() {
    let h = harness(false, |dir, _, model| {
        std::fs::create_dir_all(dir.join("target")).unwrap();
        model.install_ssh_server = true;
        model.packages = vec!["vim".to_string()];
    });

    h.controller.install().await.unwrap();

    let commands = h.process.commands();
    let position = |pattern: &str| {
        commands
            .iter()
            .position(|c| c.contains(pattern))
            .unwrap_or_else(|| panic!("{pattern} never ran: {commands:#?}"))
    };
    let unmount = position("curtin unmount -t");
    let install = position("curtin --showtrace -c");
    let ssh = position("system-install -t /target -- openssh-server");
    let vim = position("system-install -t /target -- vim");
    let umount_apt = position("etc/apt");
    let apt_update = position("apt-get update");
    let upgrades = position("unattended-upgrades -v");
    assert!(unmount < install);
    assert!(install < ssh && ssh < vim);
    assert!(vim < umount_apt && umount_apt < apt_update);
    assert!(apt_update < upgrades);

    // the temporary apt config is gone once the run finished
    let tmp = h.dir.path().join("target").join("tmp");
    assert_eq!(std::fs::read_dir(tmp).unwrap().count(), 0);
}

#[tokio::test]
async fn final_configuration_writes_its_files() {
    let h = harness(false, |_, _, model| {
        model
            .autoinstall
            .insert("version".into(), serde_yml::Value::Number(1.into()));
        model.instance_id = "iid-test".to_string();
    });

    h.controller.install().await.unwrap();

    let root = h.dir.path().join("root");
    let capture =
        std::fs::read_to_string(root.join("var/log/installer/autoinstall-user-data")).unwrap();
    assert!(capture.starts_with("#cloud-config\nautoinstall:"));

    let target = h.dir.path().join("target");
    let cloud_cfg =
        std::fs::read_to_string(target.join("etc/cloud/cloud.cfg.d/99-installer.cfg")).unwrap();
    assert!(cloud_cfg.contains("instance-id: iid-test"));

    let config =
        std::fs::read_to_string(h.dir.path().join("log/subiquity-curtin-install.conf")).unwrap();
    assert!(config.starts_with("# Autogenerated by SUbiquity: "));
    assert!(config.contains("identifier: test-event"));

    let lock = InstallLock::new(h.dir.path().join("run/installing"));
    assert!(lock.read_content().await.unwrap().is_some());
    // released after the install tool exited
    drop(lock.exclusive().await.unwrap());
}

#[tokio::test]
async fn without_network_security_updates_are_skipped() {
    let h = harness(false, |_, _, model| model.has_network = false);

    h.controller.install().await.unwrap();

    assert!(!h.sink.states().contains(&InstallState::UuRunning));
    assert!(!h.process.ran("unattended-upgrades"));
    assert!(h.process.ran("var/lib/apt/lists"));
    assert!(!h.process.ran("apt-get update"));
}

#[tokio::test]
async fn failure_runs_the_error_path() {
    let h = harness(false, |_, _, _| {});
    h.process.fail_on("--showtrace");
    h.process.on_install(vec![
        start("cmd-install", "curtin command install"),
        log_line("Traceback (most recent call last):"),
        log_line("  File \"curtin/commands/install.py\", line 1"),
        log_line("RuntimeError: disk on fire"),
        log_line("after the failure"),
    ]);

    let outcome = h.controller.install().await.unwrap();

    let report = match outcome {
        InstallOutcome::Failed {
            report: Some(report),
        } => report,
        other => panic!("expected a failed install with a report, got {other:?}"),
    };
    assert_eq!(h.controller.install_state(), InstallState::Error);
    assert_eq!(h.sink.states().last(), Some(&InstallState::Error));
    assert!(!h.sink.states().contains(&InstallState::PostWait));
    assert_eq!(h.sink.open_count(), 0);
    assert!(h.sink.is_showing());
    assert_eq!(
        *h.sink.status.lock().unwrap(),
        Some((StatusKind::Error, ERROR_STATUS_TEXT.to_string()))
    );
    assert!(h
        .sink
        .lines
        .lock()
        .unwrap()
        .iter()
        .any(|line| line.starts_with("install failed: ")));

    assert_eq!(h.controller.crash_report(), Some(report.clone()));
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report.path).unwrap()).unwrap();
    assert_eq!(written["kind"], "install_fail");
    assert_eq!(
        written["context"]["Traceback"],
        "Traceback (most recent call last):\n  File \"curtin/commands/install.py\", line 1\nRuntimeError: disk on fire"
    );
    assert!(written["files"]["CurtinConfig"]
        .as_str()
        .unwrap()
        .ends_with("subiquity-curtin-install.conf"));

    // a failed run still releases the install lock
    let lock = InstallLock::new(h.dir.path().join("run/installing"));
    drop(lock.exclusive().await.unwrap());
}

#[tokio::test]
async fn non_interactive_failure_is_returned() {
    let h = harness(false, |_, opts, model| {
        opts.interactive = false;
        model.packages = vec!["vim".to_string()];
    });
    h.process.fail_on("-- vim");

    let err = h.controller.install().await.unwrap_err();

    assert!(matches!(
        &err,
        Error::Install(InstallError::PackageFailed { package, .. }) if package == "vim"
    ));
    assert_eq!(h.controller.install_state(), InstallState::Error);
    let vim = h.sink.started_id("installing vim").unwrap();
    assert_eq!(h.sink.finish_of(vim), vec![Some(Status::Error)]);

    // the report says what failed even without a traceback
    let report = h.controller.crash_report().unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report.path).unwrap()).unwrap();
    assert_eq!(written["context"]["Error"], err.to_string());
    assert!(written["context"].get("Traceback").is_none());
}

#[tokio::test]
async fn failure_is_announced_as_an_error_event() {
    let mut h = harness(false, |_, _, _| {});
    h.process.fail_on("--showtrace");

    h.controller.install().await.unwrap();

    let mut details = None;
    while let Ok(received) = h.events.try_recv() {
        if let AppEvent::General(GeneralEvent::Error { message, details: d }) = received.event {
            assert_eq!(message, "install failed");
            details = d;
        }
    }
    let details = details.expect("no error event was emitted");
    let report = h.controller.crash_report().unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report.path).unwrap()).unwrap();
    assert_eq!(written["context"]["Error"], details);
}

#[tokio::test]
async fn failed_unmount_aborts_the_install() {
    let h = harness(false, |dir, opts, _| {
        std::fs::create_dir_all(dir.join("target")).unwrap();
        opts.interactive = false;
    });
    h.process.fail_on("curtin unmount");

    let err = h.controller.install().await.unwrap_err();

    assert!(matches!(err, Error::Install(InstallError::UnmountFailed { .. })));
    assert!(!h.process.ran("--showtrace"));
}

#[tokio::test]
async fn install_tool_exit_status_is_checked() {
    let h = harness(false, |_, opts, _| opts.interactive = false);
    h.process.fail_on("--showtrace");

    let err = h.controller.install().await.unwrap_err();

    assert!(matches!(
        err,
        Error::Platform(PlatformError::CommandFailed {
            exit_code: Some(1),
            ..
        })
    ));
}

#[tokio::test]
async fn pipeline_waits_for_readiness_and_confirmation() {
    let install_ready = subi_install::Signal::new();
    let confirmation = subi_install::Signal::new();
    let h = {
        let install_ready = install_ready.clone();
        let confirmation = confirmation.clone();
        harness(false, move |_, _, model| {
            model.install_events = vec![install_ready];
            model.confirmation = confirmation;
        })
    };
    let mut state = h.controller.subscribe_state();

    h.controller.start();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.controller.install_state(), InstallState::NotStarted);

    install_ready.set();
    state
        .wait_for(|s| *s == InstallState::NeedsConfirmation)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.controller.install_state(), InstallState::NeedsConfirmation);

    confirmation.set();
    let outcome = h.controller.wait_for_install().await.unwrap();
    assert_eq!(outcome, InstallOutcome::Completed);
}

#[tokio::test(start_paused = true)]
async fn drain_gives_up_after_five_seconds() {
    let h = harness(false, |_, _, _| {});
    // never finished, so the view keeps reporting progress
    h.process
        .on_install(vec![start("cmd-install", "curtin command install")]);

    let started = tokio::time::Instant::now();
    let outcome = h.controller.install().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome, InstallOutcome::Completed);
    assert!(elapsed >= Duration::from_secs(5), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(6), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn drain_is_immediate_when_nothing_is_open() {
    let h = harness(false, |_, _, _| {});
    h.process.on_install(vec![
        start("cmd-install", "curtin command install"),
        finish("cmd-install", "SUCCESS"),
    ]);

    let started = tokio::time::Instant::now();
    h.controller.install().await.unwrap();

    assert!(started.elapsed() < Duration::from_millis(100));
}
