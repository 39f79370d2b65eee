//! CLI surface tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

/// Write a config that keeps all state inside the test's temp dir
fn write_config(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("gantry.yml");
    let yaml = format!("storage:\n  path: {}\n", dir.join("data").display());
    std::fs::write(&path, yaml).unwrap();
    path
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("gd")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("approve"))
        .stdout(predicate::str::contains("skills"));
}

#[test]
fn skills_lists_builtins() {
    Command::cargo_bin("gd")
        .unwrap()
        .arg("skills")
        .assert()
        .success()
        .stdout(predicate::str::contains("file_read"))
        .stdout(predicate::str::contains("shell_command"))
        .stdout(predicate::str::contains("http_fetch"));
}

#[test]
fn list_on_empty_store() {
    let temp = tempdir().unwrap();
    let config = write_config(temp.path());

    Command::cargo_bin("gd")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks"));
}

#[test]
fn plan_without_api_key_fails_fast() {
    let temp = tempdir().unwrap();
    let config = write_config(temp.path());

    Command::cargo_bin("gd")
        .unwrap()
        .env_remove("ANTHROPIC_API_KEY")
        .args(["--config", config.to_str().unwrap(), "plan", "do something"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ANTHROPIC_API_KEY"));
}

#[test]
fn status_of_unknown_task_fails() {
    let temp = tempdir().unwrap();
    let config = write_config(temp.path());

    Command::cargo_bin("gd")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "status", "deadbeef"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No task matches"));
}
