//! CLI tests for the planstream binary
//!
//! Each test points HOME and the XDG directories at a temp dir so logs and
//! config lookups never touch the real user environment.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use planstream::{EventLogger, SessionEvent};
use predicates::prelude::*;
use tempfile::TempDir;

fn planstream(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("planstream").unwrap();
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_DATA_HOME", home.join("data"))
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("NO_COLOR", "1")
        .env_remove("PLANSTREAM_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn write_frames(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("frames.jsonl");
    let frames = [
        r#"{"type":"status","message":"planning"}"#,
        r#"{"type":"plan_created","response":{"title":"Pokhara Trip","days":[]}}"#,
        "{broken",
        r#"{"type":"day_added","response":{"title":"Pokhara Trip","days":[{"day":1,"title":"Lakeside","steps":[{"type":"visit","title":"Phewa Lake"}]}]}}"#,
        "",
        r#"{"type":"completed"}"#,
        r#"{"type":"plan_created","response":{"title":"ignored"}}"#,
    ];
    fs::write(&path, frames.join("\n")).unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    planstream(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("replay"))
        .stdout(predicate::str::contains("plans"))
        .stdout(predicate::str::contains("Logs are written to:"));
}

#[test]
fn test_version() {
    let temp = TempDir::new().unwrap();
    planstream(temp.path()).arg("--version").assert().success();
}

#[test]
fn test_replay_file_text() {
    let temp = TempDir::new().unwrap();
    let frames = write_frames(temp.path());

    planstream(temp.path())
        .arg("replay")
        .arg(&frames)
        .assert()
        .success()
        .stdout(predicate::str::contains("Replayed 5 of 6 frames"))
        .stdout(predicate::str::contains("Pokhara Trip"))
        .stdout(predicate::str::contains("Day 1: Lakeside"))
        .stdout(predicate::str::contains("[visit] Phewa Lake"))
        .stdout(predicate::str::contains("Status: complete"))
        .stdout(predicate::str::contains("ignored").not());
}

#[test]
fn test_replay_file_json() {
    let temp = TempDir::new().unwrap();
    let frames = write_frames(temp.path());

    let output = planstream(temp.path())
        .args(["replay", "--format", "json"])
        .arg(&frames)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["complete"], true);
    assert_eq!(report["frames_handled"], 5);
    assert_eq!(report["snapshot"]["title"], "Pokhara Trip");
    assert_eq!(report["counts"]["malformed"], 1);
    assert_eq!(report["counts"]["snapshots"], 2);
    assert_eq!(report["counts"]["status"], 1);
    assert_eq!(report["counts"]["completions"], 1);
}

#[test]
fn test_replay_missing_file_fails() {
    let temp = TempDir::new().unwrap();
    planstream(temp.path())
        .args(["replay", "does-not-exist.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read frames"));
}

#[test]
fn test_replay_and_events_from_session_log() {
    let temp = TempDir::new().unwrap();
    let runs = temp.path().join("runs");
    let config = temp.path().join("planstream.yml");
    fs::write(&config, format!("storage:\n  runs-dir: {}\n", runs.display())).unwrap();

    let mut logger = EventLogger::new(&runs);
    let id = "abcd1234-plan-pokhara";
    for raw in [
        r#"{"type":"plan_created","response":{"title":"Logged Trip"}}"#,
        r#"{"type":"completed"}"#,
    ] {
        logger
            .write_event(&SessionEvent::FrameReceived {
                session_id: id.to_string(),
                raw: raw.to_string(),
            })
            .unwrap();
    }
    logger.close_session(id);

    planstream(temp.path())
        .arg("-c")
        .arg(&config)
        .args(["replay", "--session", id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged Trip"))
        .stdout(predicate::str::contains("Status: complete"));

    planstream(temp.path())
        .arg("-c")
        .arg(&config)
        .args(["events", id])
        .assert()
        .success()
        .stdout(predicate::str::contains("FrameReceived"));

    planstream(temp.path())
        .arg("-c")
        .arg(&config)
        .args(["replay", "--session", "missing-session"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No recorded events"));
}

#[test]
fn test_generate_without_token_fails() {
    let temp = TempDir::new().unwrap();
    planstream(temp.path())
        .args(["generate", "5 days in Pokhara"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("PLANSTREAM_TOKEN"));
}

#[test]
fn test_bad_explicit_config_fails() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("broken.yml");
    fs::write(&config, "server: [unclosed").unwrap();

    planstream(temp.path())
        .arg("-c")
        .arg(&config)
        .arg("logs")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_logs_command() {
    let temp = TempDir::new().unwrap();
    planstream(temp.path())
        .args(["logs", "-n", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logging initialized"));
}
