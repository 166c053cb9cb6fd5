use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn spoon() -> Command {
    Command::cargo_bin("spoon").unwrap()
}

#[test]
fn test_polite_run_reports_livelock() {
    spoon()
        .args([
            "run",
            "--policy",
            "polite",
            "--max-steps",
            "500",
            "--backoff-us",
            "0",
        ])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Outcome: livelocked after 500 steps"))
        .stdout(predicate::str::contains("Consumes: 0"));
}

#[test]
fn test_fair_run_satisfies_everyone() {
    spoon()
        .args([
            "run",
            "--policy",
            "fair",
            "--threshold",
            "2",
            "--backoff-us",
            "0",
            "--narrate",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Outcome: all satisfied"))
        .stdout(predicate::str::contains(
            "Bob: You eat first my darling Alice!",
        ))
        .stdout(predicate::str::contains("Bob: I am stuffed, my darling Alice!"))
        .stdout(predicate::str::contains("Alice: I am stuffed, my darling Bob!"));
}

#[test]
fn test_json_report() {
    let output = spoon()
        .args([
            "run",
            "--policy",
            "fair",
            "--actors",
            "Ann",
            "Ben",
            "Cy",
            "--backoff-us",
            "0",
            "--json",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outcome"], "all_satisfied");
    assert_eq!(report["consumes"], 3);
    assert_eq!(report["actors"].as_array().unwrap().len(), 3);
    assert_eq!(report["policy"]["kind"], "fair");
}

#[test]
fn test_single_actor_is_rejected() {
    spoon()
        .args(["run", "--actors", "Solo"])
        .assert()
        .failure();
}

#[test]
fn test_unknown_owner_is_rejected() {
    spoon()
        .args(["run", "--owner", "Carol"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Carol"));
}

#[test]
fn test_config_file_drives_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spoon.toml");
    fs::write(
        &path,
        r#"
initial_owner = "Bob"

[supervisor]
max_steps = 100
backoff_us = 0

[supervisor.policy]
kind = "fair"
threshold = 1

[[actors]]
name = "Bob"

[[actors]]
name = "Alice"
needs = false
"#,
    )
    .unwrap();

    spoon()
        .args(["run", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Steps: 1  Transfers: 0  Consumes: 1"));

    spoon()
        .arg("check-config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("threshold = 1"));
}

#[test]
fn test_check_config_rejects_bad_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[[actors]]\nname = \"Solo\"\n").unwrap();

    spoon()
        .arg("check-config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least two actors"));
}
