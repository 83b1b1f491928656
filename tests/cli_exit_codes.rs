//! CLI surface and exit-code contract.
//!
//! These tests never reach the external tools: they exercise argument
//! parsing, configuration validation and source admission, which all fail
//! before any subprocess besides the hardware probe runs.

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd(root: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("clipforge").expect("binary builds");
    cmd.env("CLIPFORGE_ROOT", root);
    cmd
}

#[test]
fn help_exits_zero() {
    let tmp = tempfile::tempdir().expect("tempdir");
    cmd(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--duration-class"));
}

#[test]
fn missing_input_argument_fails_parsing() {
    let tmp = tempfile::tempdir().expect("tempdir");
    cmd(tmp.path()).assert().failure();
}

#[test]
fn invalid_configuration_exits_one() {
    let tmp = tempfile::tempdir().expect("tempdir");
    cmd(tmp.path())
        .arg("whatever.mp4")
        .env("CLIP_MIN", "4")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("CLIP_MIN"));
}

#[test]
fn invalid_beam_width_exits_one() {
    let tmp = tempfile::tempdir().expect("tempdir");
    cmd(tmp.path())
        .arg("whatever.mp4")
        .env("TRANSCRIBER_BEAM", "9")
        .assert()
        .code(1);
}

#[test]
fn missing_source_file_exits_two() {
    let tmp = tempfile::tempdir().expect("tempdir");
    cmd(tmp.path())
        .arg(tmp.path().join("does-not-exist.mp4"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn oversized_source_exits_two_with_size_reason() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("big.mp4");
    std::fs::write(&source, vec![0u8; 4096]).expect("write fixture");

    cmd(tmp.path())
        .arg(&source)
        .env("MAX_SOURCE_SIZE", "1K")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("source too large"));
}
