//! The reboot button and the security update run it may cancel

mod common;

use std::time::Duration;

use common::{harness, Harness};
use subi_install::InstallOutcome;
use subi_platform::ProcessHandle;
use subi_types::InstallState;

async fn wait_for_security_updates(h: &Harness) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !h.controller.unattended_upgrades_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("security updates never started");
    assert_eq!(h.controller.install_state(), InstallState::UuRunning);
}

#[tokio::test]
async fn reboot_cancels_running_updates_in_dry_run() {
    let h = harness(true, |_, opts, _| {
        opts.replay_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos");
    });
    h.process.hold_spawned();

    h.controller.start();
    wait_for_security_updates(&h).await;
    let uu = h
        .sink
        .started_id("downloading and installing security updates")
        .unwrap();

    h.controller.click_reboot().await.unwrap();

    assert!(h.controller.reboot_clicked().is_set());
    let outcome = h.controller.wait_for_install().await.unwrap();
    assert_eq!(outcome, InstallOutcome::Completed);

    let states = h.sink.states();
    let cancelling = states
        .iter()
        .position(|s| *s == InstallState::UuCancelling)
        .unwrap();
    assert_eq!(states[cancelling - 1], InstallState::UuRunning);
    assert_eq!(states.last(), Some(&InstallState::Done));

    assert!(h.process.spawned().iter().all(|handle| handle.was_terminated()));
    assert_eq!(h.sink.finish_of(uu).first(), Some(&None));
    // shown beside the update run, under the hidden install root
    let (_, parent) = h.sink.started_entry("cancelling update").unwrap();
    assert_eq!(parent, None);
    assert!(!h.process.ran("--stop-only"));
}

#[tokio::test]
async fn reboot_stops_updates_through_the_shutdown_helper() {
    let h = harness(false, |_, _, _| {});
    h.process.hold_spawned();

    h.controller.start();
    wait_for_security_updates(&h).await;
    h.controller.click_reboot().await.unwrap();

    assert!(h.process.ran(
        "chroot /target /usr/share/unattended-upgrades/unattended-upgrade-shutdown --stop-only"
    ));
    assert_eq!(
        h.controller.wait_for_install().await.unwrap(),
        InstallOutcome::Completed
    );
    assert!(h.controller.reboot_clicked().is_set());
}

#[tokio::test]
async fn failed_stop_still_requests_the_reboot() {
    let h = harness(false, |_, _, _| {});
    h.process.hold_spawned();
    h.process.fail_on("--stop-only");

    h.controller.start();
    wait_for_security_updates(&h).await;

    assert!(h.controller.click_reboot().await.is_err());
    assert!(h.controller.reboot_clicked().is_set());
    assert!(h.sink.states().contains(&InstallState::UuCancelling));

    // the update run still has to exit before the install task ends
    for handle in h.process.spawned() {
        handle.terminate().unwrap();
    }
    h.controller.wait_for_install().await.unwrap();
    let (stop, _) = h.sink.started_entry("cancelling update").unwrap();
    assert_eq!(h.sink.finish_of(stop), vec![Some(subi_types::Status::Error)]);
}

#[tokio::test]
async fn reboot_without_updates_only_sets_the_signal() {
    let h = harness(false, |_, _, _| {});

    h.controller.click_reboot().await.unwrap();

    assert!(h.controller.reboot_clicked().is_set());
    assert_eq!(h.controller.install_state(), InstallState::NotStarted);
    assert!(h.process.commands().is_empty());
    assert!(h.sink.states().is_empty());
}

#[tokio::test]
async fn answers_requesting_reboot_preset_the_signal() {
    let h = harness(false, |_, opts, _| opts.reboot = true);
    assert!(h.controller.reboot_clicked().is_set());
    h.controller.reboot_clicked().wait().await;
}

#[tokio::test]
async fn autoinstall_reboots_on_exit_after_the_install() {
    let h = harness(false, |_, _, _| {});
    assert!(!h.controller.reboot_on_exit());

    h.controller.start();
    h.controller.apply_autoinstall_config().await.unwrap();

    assert!(h.controller.reboot_on_exit());
    assert_eq!(h.controller.install_state(), InstallState::Done);
}
