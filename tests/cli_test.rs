//! Command-line surface tests
//!
//! None of these reach the network: either validation fails first or there is
//! no session token to send with.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn inbox_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("provider-inbox").unwrap();
    cmd.env_remove("PROVIDER_INBOX_API_URL")
        .env_remove("PROVIDER_INBOX_SESSION_FILE")
        .env("RUST_LOG", "off")
        .arg("--api-url")
        .arg("http://127.0.0.1:9/api")
        .arg("--session-file")
        .arg(dir.path().join("missing.json"));
    cmd
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("provider-inbox")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("conversations")
                .and(predicate::str::contains("thread"))
                .and(predicate::str::contains("send"))
                .and(predicate::str::contains("watch")),
        );
}

#[test]
fn test_send_blank_message_is_rejected() {
    let dir = TempDir::new().unwrap();
    inbox_cmd(&dir)
        .args(["send", "c1", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("empty"));
}

#[test]
fn test_thread_without_session_reports_signed_out() {
    let dir = TempDir::new().unwrap();
    inbox_cmd(&dir)
        .args(["thread", "c1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in"));
}

#[test]
fn test_send_without_session_reports_signed_out() {
    let dir = TempDir::new().unwrap();
    inbox_cmd(&dir)
        .args(["send", "c1", "hello", "there"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in"));
}

#[test]
fn test_send_requires_content() {
    let dir = TempDir::new().unwrap();
    inbox_cmd(&dir).args(["send", "c1"]).assert().failure();
}
