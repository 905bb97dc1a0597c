//! Smoke tests for the handset CLI
//!
//! These tests verify basic CLI functionality works correctly.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the handset binary, isolated from the caller's environment
fn handset(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("handset").expect("handset binary should exist");
    cmd.env_remove("HANDSET_ENV")
        .env_remove("RUST_LOG")
        .arg("--config-dir")
        .arg(config_dir.path());
    cmd
}

fn app_identity() -> [&'static str; 6] {
    [
        "--set",
        "android.app.package=com.example.shop",
        "--set",
        "android.app.activity=.MainActivity",
        "--set",
        "android.app.path=/nonexistent/app.apk",
    ]
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_help_flag() {
    let dir = TempDir::new().unwrap();
    handset(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Appium"))
        .stdout(predicate::str::contains("smoke"))
        .stdout(predicate::str::contains("capabilities"));
}

#[test]
fn test_no_args_fails() {
    let dir = TempDir::new().unwrap();
    handset(&dir).assert().failure(); // Requires a subcommand
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_reports_layers() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("default.yaml"),
        "framework:\n  platform: android\n  device:\n    name: Pixel 7\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("staging.yaml"),
        "framework:\n  device:\n    name: Pixel 8\n",
    )
    .unwrap();

    let output = handset(&dir)
        .args(["--env", "staging", "config", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["environment"], "staging");
    assert_eq!(value["properties"]["framework.device.name"]["value"], "Pixel 8");
    assert_eq!(
        value["properties"]["framework.device.name"]["layer"],
        "environment_file"
    );
    assert_eq!(value["properties"]["framework.platform"]["layer"], "base_file");
}

#[test]
fn test_config_reports_environment_variable_layer() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("default.yaml"),
        "framework:\n  video:\n    enabled: true\n",
    )
    .unwrap();

    let output = handset(&dir)
        .env("HANDSET__FRAMEWORK__VIDEO__ENABLED", "false")
        .args(["config", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let enabled = &value["properties"]["framework.video.enabled"];
    assert_eq!(enabled["value"], "false");
    assert_eq!(enabled["layer"], "environment_variable");
}

#[test]
fn test_missing_environment_file_fails() {
    let dir = TempDir::new().unwrap();
    handset(&dir)
        .args(["--env", "nowhere", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nowhere"));
}

#[test]
fn test_unsupported_platform_fails() {
    let dir = TempDir::new().unwrap();
    handset(&dir)
        .args(["--set", "framework.platform=windows", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("windows"));
}

// ============================================================================
// Capabilities
// ============================================================================

#[test]
fn test_capabilities_json() {
    let dir = TempDir::new().unwrap();
    let output = handset(&dir)
        .args(app_identity())
        .arg("capabilities")
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        value["capabilities"]["alwaysMatch"]["appium:appPackage"],
        "com.example.shop"
    );
}

#[test]
fn test_capabilities_ios_needs_bundle_id() {
    let dir = TempDir::new().unwrap();
    handset(&dir)
        .args(["--set", "ios.app.path=/nonexistent/app.app"])
        .args(["capabilities", "--platform", "ios"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ios.bundle_id"));
}

// ============================================================================
// Smoke
// ============================================================================

#[test]
fn test_smoke_dry_run() {
    let dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    handset(&dir)
        .args(app_identity())
        .arg("--set")
        .arg(format!("framework.output.dir={}", out.path().display()))
        .args(["smoke", "--dry-run"])
        .assert()
        .success()
        .stderr(predicate::str::contains("PASSED"));

    assert!(out.path().join("reports").join("report.html").is_file());
    assert!(out.path().join("allure-results").is_dir());
    // Passing run with default retention keeps no recording
    let videos = out.path().join("videos");
    assert!(!videos.exists() || fs::read_dir(videos).unwrap().next().is_none());
}

#[test]
fn test_smoke_without_app_identity_fails() {
    let dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    handset(&dir)
        .arg("--set")
        .arg(format!("framework.output.dir={}", out.path().display()))
        .args(["--set", "android.app.path=/nonexistent/app.apk"])
        .args(["smoke", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Smoke scenario failed"));
}

// ============================================================================
// Clean
// ============================================================================

#[test]
fn test_clean_all() {
    let dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let shots = out.path().join("screenshots");
    fs::create_dir_all(&shots).unwrap();
    fs::write(shots.join("old.png"), b"png").unwrap();

    handset(&dir)
        .arg("--set")
        .arg(format!("framework.output.dir={}", out.path().display()))
        .args(["clean", "--all"])
        .assert()
        .success();
    assert!(!shots.exists());
}
