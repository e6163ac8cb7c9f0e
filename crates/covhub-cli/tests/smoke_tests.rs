//! Smoke tests for the covhub binary
//!
//! Run with: cargo test -p covhub-cli --test smoke_tests

#![allow(deprecated)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn covhub() -> Command {
    Command::cargo_bin("covhub").unwrap()
}

// ============================================================================
// Basic CLI
// ============================================================================

#[test]
fn test_version() {
    covhub()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.3.0"));
}

#[test]
fn test_help() {
    covhub()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("report"));
}

#[test]
fn test_no_args_fails() {
    covhub().assert().failure();
}

#[test]
fn test_serve_help() {
    covhub()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--mount"))
        .stdout(predicate::str::contains("--reset-on-get"));
}

// ============================================================================
// Serve
// ============================================================================

#[test]
fn test_serve_rejects_relative_mount() {
    let temp = TempDir::new().unwrap();
    covhub()
        .current_dir(temp.path())
        .args(["serve", "--mount", "coverage"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("mount must start with '/'"));
}

#[test]
fn test_serve_rejects_missing_root() {
    let temp = TempDir::new().unwrap();
    covhub()
        .current_dir(temp.path())
        .args(["serve", "--root", "absent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("root is not a directory"));
}

// ============================================================================
// Report
// ============================================================================

#[test]
fn test_report_writes_outputs() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("coverage.json");
    std::fs::write(
        &input,
        r#"{"/src/app.js":{"path":"/src/app.js","s":{"0":3},"statementMap":{"0":{"start":{"line":1,"column":0},"end":{"line":1,"column":5}}}}}"#,
    )
    .unwrap();
    let output = temp.path().join("report");

    covhub()
        .arg("report")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("LCOV report"));

    assert!(output.join("lcov-report/index.html").is_file());
    let lcov = std::fs::read_to_string(output.join("lcov.info")).unwrap();
    assert!(lcov.contains("SF:/src/app.js"));
}

#[test]
fn test_report_missing_input_fails() {
    let temp = TempDir::new().unwrap();
    covhub()
        .args(["report", "missing.json"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}
