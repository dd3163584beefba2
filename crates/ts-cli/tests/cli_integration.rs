//! CLI integration tests
//!
//! Tests the tabshell CLI using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn tabshell() -> Command {
    let mut cmd = Command::cargo_bin("tabshell")
        .expect("Failed to locate tabshell binary - ensure it's built before running tests");
    cmd.env_remove("TABSHELL_PROFILES")
        .env_remove("TABSHELL_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

/// A command pointed at a throwaway config and profile store
fn sandboxed(dir: &Path) -> Command {
    let mut cmd = tabshell();
    cmd.arg("--config")
        .arg(dir.join("config.toml"))
        .arg("--profiles")
        .arg(dir.join("profiles.toml"));
    cmd
}

fn add_profile(dir: &Path, name: &str) {
    sandboxed(dir)
        .args(["profiles", "add", name, "db.lan", "-u", "admin", "--port", "2222"])
        .args(["--password", "hunter2"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Added profile '{}'", name)));
}

fn listed(dir: &Path) -> Vec<serde_json::Value> {
    let output = sandboxed(dir)
        .args(["profiles", "list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_cli_help() {
    tabshell()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("tabshell"))
        .stdout(predicate::str::contains("Tabbed remote shell client"));
}

#[test]
fn test_cli_version() {
    tabshell()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tabshell"));
}

#[test]
fn test_cli_profiles_help() {
    tabshell()
        .args(["profiles", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("duplicate"));
}

#[test]
fn test_cli_connect_help() {
    tabshell()
        .args(["connect", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shell session"));
}

#[test]
fn test_cli_unknown_command() {
    tabshell()
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_connect_requires_profile() {
    tabshell()
        .arg("connect")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<PROFILE>"));
}

#[test]
fn test_connect_unknown_profile_fails() {
    let dir = TempDir::new().unwrap();
    sandboxed(dir.path())
        .args(["connect", "conn_missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown profile 'conn_missing'"));
}

#[test]
fn test_empty_profile_list() {
    let dir = TempDir::new().unwrap();
    sandboxed(dir.path())
        .args(["profiles", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No profiles stored"));
}

#[test]
fn test_add_then_list_hides_password() {
    let dir = TempDir::new().unwrap();
    add_profile(dir.path(), "db");

    sandboxed(dir.path())
        .args(["profiles", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("db.lan:2222"))
        .stdout(predicate::str::contains("hunter2").not());

    let profiles = listed(dir.path());
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0]["name"], "db");
    assert_eq!(profiles[0]["auth"], "password");
    assert!(profiles[0].get("password").is_none());
}

#[test]
fn test_add_without_credentials_fails() {
    let dir = TempDir::new().unwrap();
    sandboxed(dir.path())
        .args(["profiles", "add", "db", "db.lan", "-u", "admin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--password or --key"));
}

#[test]
fn test_duplicate_and_remove() {
    let dir = TempDir::new().unwrap();
    add_profile(dir.path(), "db");
    let id = listed(dir.path())[0]["id"].as_str().unwrap().to_string();

    sandboxed(dir.path())
        .args(["profiles", "duplicate", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("db (copy)"));
    assert_eq!(listed(dir.path()).len(), 2);

    sandboxed(dir.path())
        .args(["profiles", "remove", &id])
        .assert()
        .success();
    let remaining = listed(dir.path());
    assert_eq!(remaining.len(), 1);
    assert_ne!(remaining[0]["id"], id.as_str());

    sandboxed(dir.path())
        .args(["profiles", "remove", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Profile not found"));
}

#[test]
fn test_export_then_import_into_another_store() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    add_profile(source.path(), "db");
    add_profile(source.path(), "web");

    let export: PathBuf = source.path().join("export.json");
    sandboxed(source.path())
        .args(["profiles", "export"])
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 profiles"));

    sandboxed(target.path())
        .args(["profiles", "import"])
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 profiles"));

    let mut names: Vec<String> = listed(target.path())
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["db", "web"]);
}

#[test]
fn test_config_path_prints_override() {
    let dir = TempDir::new().unwrap();
    sandboxed(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_then_show() {
    let dir = TempDir::new().unwrap();

    sandboxed(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No configuration file found"))
        .stdout(predicate::str::contains("handshake_timeout = 45"));

    sandboxed(dir.path())
        .args(["config", "init"])
        .assert()
        .success();
    assert!(dir.path().join("config.toml").exists());

    sandboxed(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("term = \"xterm-256color\""));
}
