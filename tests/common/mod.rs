#![allow(dead_code)]

use std::{path::PathBuf, sync::Mutex};

use assert_cmd::Command;
use once_cell::sync::Lazy;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// A fresh data directory that outlives the test that created it.
pub fn temp_home() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    base
}

/// The shell in script mode, rooted at `home`.
pub fn script_cli(home: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("buzzkill_cli").expect("binary built");
    cmd.env("BUZZKILL_CLI_SCRIPT", "1")
        .env("BUZZKILL_HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

/// Parsed `ledger.json` under `home`.
pub fn read_ledger(home: &PathBuf) -> serde_json::Value {
    let raw = std::fs::read_to_string(home.join("ledger.json")).expect("ledger written");
    serde_json::from_str(&raw).expect("ledger is valid json")
}
