//! Integration tests for repomirror CLI commands
//! These tests run the actual binary and verify its behavior

mod common;

use assert_fs::{fixture::PathChild, TempDir};
use predicates::prelude::*;
use std::process::Command;

use common::{assert_contains_all, TestEnvironment};

fn repomirror() -> Command {
    Command::new(env!("CARGO_BIN_EXE_repomirror"))
}

#[test]
fn test_cli_help() {
    let output = repomirror().arg("--help").output().expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains_all(&stdout, &["sync", "list", "validate", "--config"]);
}

#[test]
fn test_cli_version() {
    let output = repomirror().arg("--version").output().expect("Failed to execute command");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("repomirror"));
}

#[test]
fn test_help_subcommands() {
    for cmd in ["sync", "list", "validate"] {
        let output = repomirror()
            .args([cmd, "--help"])
            .output()
            .unwrap_or_else(|_| panic!("Failed to execute {} help", cmd));

        assert!(output.status.success(), "Help for {} command failed", cmd);
        assert!(!output.stdout.is_empty(), "Help output for {} was empty", cmd);
    }

    let sync_help = repomirror().args(["sync", "--help"]).output().unwrap();
    assert_contains_all(&String::from_utf8_lossy(&sync_help.stdout), &["--dry-run", "--json"]);
}

#[test]
fn test_validate_reports_endpoints() {
    let env = TestEnvironment::new();
    let config_path = env.create_minimal_config();

    let output = repomirror()
        .args(["--config", config_path.to_str().unwrap(), "validate"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains_all(
        &stdout,
        &[
            "Configuration is valid",
            "gitlab:gitlab.com/platform",
            "directory:/srv/mirror",
            "archive:/srv/backup",
            "Parallel transfers: 2",
        ],
    );
}

#[test]
fn test_user_and_group_together_are_rejected() {
    let env = TestEnvironment::new();
    let config_path = env.create_test_config(
        r#"
source:
  provider: github
  user: someone
  group: some-org
targets:
  - provider: directory
    path: /srv/mirror
"#,
    );

    let output = repomirror()
        .args(["--config", config_path.to_str().unwrap(), "validate"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(predicate::str::contains("both user (someone) and group (some-org) are set").eval(&stderr[..]));
}

#[test]
fn test_error_handling_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.child("invalid-config.yml");

    std::fs::write(config_path.path(), "invalid: yaml: content: [").unwrap();

    let output = repomirror()
        .args(["--config", config_path.path().to_str().unwrap(), "validate"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to parse config file"));
}

#[test]
fn test_missing_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.child("absent.yml");

    let output = repomirror()
        .args(["--config", config_path.path().to_str().unwrap(), "sync", "--dry-run"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read config file"));
}

#[test]
fn test_invalid_command() {
    let output = repomirror()
        .arg("nonexistent-command")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let unknown = predicate::str::contains("error").or(predicate::str::contains("unrecognized"));
    assert!(unknown.eval(&stderr[..]));
}
