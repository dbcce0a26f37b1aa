//! Integration tests for the subi CLI

use std::path::PathBuf;
use std::process::Command;

fn subi() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_subi"));
    cmd.env_remove("RUST_LOG").arg("--color").arg("never");
    cmd
}

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name)
}

#[test]
fn test_cli_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_subi"))
        .arg("--version")
        .output()
        .expect("Failed to execute subi");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("subi"));
}

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_subi"))
        .arg("--help")
        .output()
        .expect("Failed to execute subi");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Server installer progress front end"));
    assert!(stdout.contains("install"));
    assert!(stdout.contains("network"));
}

#[test]
fn test_cli_invalid_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_subi"))
        .arg("invalid-command")
        .output()
        .expect("Failed to execute subi");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unrecognized subcommand"));
}

#[test]
fn test_network_overview() {
    let output = subi()
        .arg("network")
        .arg(demo("network.yaml"))
        .output()
        .expect("Failed to execute subi");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("192.168.122.10/24 (dhcp) from 192.168.122.0/24"));
    assert!(stdout.contains("No IPv6 connection"));
    assert!(stdout.contains("IPv4 default route via 192.168.122.1."));
    assert!(stdout.contains("IPv6 default route is unset."));
    assert!(stdout.contains("Set default route"));
    assert!(stdout.contains("Bond interfaces"));
    assert!(!stdout.contains("Unknown"));
}

#[test]
fn test_network_done_prints_actions() {
    let output = subi()
        .arg("network")
        .arg(demo("network.yaml"))
        .arg("--done")
        .output()
        .expect("Failed to execute subi");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let physical = stdout.find("type: physical").expect("interface action");
    let route = stdout.find("type: route").expect("route action");
    assert!(physical < route);
}

#[test]
fn test_network_without_interfaces() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("empty.yaml");
    std::fs::write(&file, "interfaces: []\n").unwrap();

    let output = subi()
        .arg("network")
        .arg(&file)
        .output()
        .expect("Failed to execute subi");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No network interfaces detected."));
    assert!(!stdout.contains("default route"));
}

#[test]
fn test_network_bad_description_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("bad.yaml");
    std::fs::write(&file, "interfaces: 7\n").unwrap();

    let output = subi()
        .arg("network")
        .arg(&file)
        .output()
        .expect("Failed to execute subi");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Network description error"));
}

#[test]
fn test_invalid_scale_factor_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[general]\ncolor = \"never\"\n").unwrap();

    let output = subi()
        .env("SUBI_SCALE_FACTOR", "0")
        .arg("--config")
        .arg(&config)
        .arg("network")
        .arg(demo("network.yaml"))
        .output()
        .expect("Failed to execute subi");

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_missing_config_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = subi()
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .arg("network")
        .arg(demo("network.yaml"))
        .output()
        .expect("Failed to execute subi");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Configuration error"));
}
