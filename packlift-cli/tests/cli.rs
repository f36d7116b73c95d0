//! Smoke tests for CLI argument handling.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_the_build_subcommand() {
    Command::cargo_bin("packlift")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"));
}

#[test]
fn build_without_detection_outputs_fails() {
    let temp = tempfile::TempDir::new().expect("temp dir");
    Command::cargo_bin("packlift")
        .expect("binary")
        .arg("build")
        .arg("--layers")
        .arg(temp.path())
        .arg("--app")
        .arg(temp.path())
        .assert()
        .failure()
        .code(1);
}
