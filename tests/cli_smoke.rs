//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn isolated(tmp: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("gantry");
    cmd.env("HOME", tmp.path())
        .env("XDG_CONFIG_HOME", tmp.path())
        .env("GANTRY_STATE_DIR", tmp.path())
        .env_remove("GANTRY_CONFIG_PATH")
        .env_remove("GOOGLE_APPLICATION_CREDENTIALS")
        .current_dir(tmp.path());
    cmd
}

#[test]
fn help_lists_the_lifecycle_commands() {
    let mut cmd = cargo_bin_cmd!("gantry");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("info"))
        .stdout(predicate::str::contains("down"));
}

#[test]
fn no_arguments_prints_usage() {
    let mut cmd = cargo_bin_cmd!("gantry");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn the_local_environment_is_rejected_before_any_work() {
    let tmp = TempDir::new().expect("tempdir");
    isolated(&tmp)
        .args([
            "up",
            "--name",
            "c1",
            "--project",
            "a1",
            "--zone",
            "us-central1-a",
            "--configure-env",
            "local",
            "--yes",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error:"))
        .stderr(predicate::str::contains("`local` environment is reserved"));
}

#[test]
fn debug_cannot_configure_an_environment() {
    let tmp = TempDir::new().expect("tempdir");
    isolated(&tmp)
        .args(["info", "--debug", "--configure-env", "staging"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn invalid_settings_are_reported_with_a_hint() {
    let tmp = TempDir::new().expect("tempdir");
    isolated(&tmp)
        .env("GANTRY_POLL_INTERVAL_SECS", "0")
        .args(["down", "--name", "c1", "--yes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("GANTRY_POLL_INTERVAL_SECS"));
}
