//! Integration tests for the CLI interface
//!
//! Only paths that need neither dcm2niix nor dcmdump are exercised here;
//! full conversions run against the in-memory fakes in coiner_integration.rs.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_cli_help_flag() {
    let mut cmd = Command::cargo_bin("bidscoiner").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("--participants"))
        .stdout(predicate::str::contains("bidscoiner -f /project/raw"));
}

#[test]
fn test_missing_folders_is_usage_error() {
    let mut cmd = Command::cargo_bin("bidscoiner").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("error:"))
        .stderr(predicate::str::contains("<RAWFOLDER>"));
}

#[test]
fn test_missing_bidsmap_exits_with_config_code() {
    let temp_dir = TempDir::new().unwrap();
    let raw = temp_dir.path().join("raw");
    fs::create_dir_all(&raw).unwrap();

    let mut cmd = Command::cargo_bin("bidscoiner").unwrap();
    cmd.arg(&raw)
        .arg(temp_dir.path().join("bids"))
        .args(["-b", "nowhere.yaml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("bidsmap not found"));

    // The transcript still records what happened
    let log = fs::read_to_string(temp_dir.path().join("bids/code/bidscoiner.log")).unwrap();
    assert!(log.contains("Error [E1001]"));
}

#[test]
fn test_missing_raw_folder_fails() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("bidscoiner").unwrap();
    cmd.arg(temp_dir.path().join("absent"))
        .arg(temp_dir.path().join("bids"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_empty_raw_folder_runs_to_completion() {
    let temp_dir = TempDir::new().unwrap();
    let raw = temp_dir.path().join("raw");
    let bids = temp_dir.path().join("bids");
    fs::create_dir_all(&raw).unwrap();
    fs::create_dir_all(bids.join("code")).unwrap();
    // Only a plugin is enabled so no converter is probed
    fs::write(
        bids.join("code/bidsmap.yaml"),
        "Options:\n  dcm2niix: -b y\nPlugIn: [physio]\n",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("bidscoiner").unwrap();
    cmd.arg(&raw)
        .arg(&bids)
        .assert()
        .success()
        .stdout(predicate::str::contains("Sessions converted: 0, skipped: 0"));

    assert_eq!(
        fs::read_to_string(bids.join(".bidsignore")).unwrap(),
        "extra_data/\n"
    );
    assert!(bids.join("code/bidscoiner.log").exists());
}
