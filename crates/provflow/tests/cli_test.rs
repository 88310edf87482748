#![allow(deprecated)] // TODO: move from cargo_bin to the cargo_bin_cmd! macro

use assert_cmd::Command;
use predicates::prelude::*;

/// Help lists the environment argument and the run flags
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("provflow").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("one confirmed step at a time"))
        .stdout(predicate::str::contains("<ENVIRONMENT>"))
        .stdout(predicate::str::contains("--yes"))
        .stdout(predicate::str::contains("--strict"))
        .stdout(predicate::str::contains("--policy-template"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("provflow").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("provflow"));
}

#[test]
fn test_environment_is_required() {
    let mut cmd = Command::cargo_bin("provflow").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("<ENVIRONMENT>"));
}

/// Without the cloud CLIs on PATH the run stops before the first step
#[test]
fn test_missing_binaries_fail_preflight() {
    let empty = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("provflow").unwrap();
    cmd.arg("dev")
        .env("PATH", empty.path())
        .env("PROVFLOW_BASE_PROJECT_ID", "acme")
        .write_stdin("")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("1/19.").not())
        .stderr(predicate::str::contains("gcloud not found"));
}
