// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use cairn::{ClientMessage, SyncEventType};
use common::{wait_until, TestRelay};
use predicates::prelude::*;
use tempfile::TempDir;

fn cairn() -> Command {
    cargo_bin_cmd!("cairn")
}

fn write_config(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn check_prints_effective_config_without_token() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "cairn.toml",
        r#"
url = "ws://relay.local:8080"
user_id = "alice"
terminal_id = "alice-laptop"
token = "s3cret"
"#,
    );

    cairn()
        .arg("check")
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("config ok: cairn.toml"))
        .stdout(predicate::str::contains(r#"user_id = "alice""#))
        .stdout(predicate::str::contains("<redacted>"))
        .stdout(predicate::str::contains("s3cret").not());
}

#[test]
fn check_uses_explicit_config_path() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "relay.toml",
        "user_id = \"bob\"\nterminal_id = \"bob-desk\"\n",
    );

    cairn()
        .arg("check")
        .arg("-c")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"terminal_id = "bob-desk""#));
}

#[test]
fn check_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "cairn.toml",
        r#"
url = "ws://relay.local"
user_id = ""
terminal_id = "t1"
"#,
    );

    cairn()
        .arg("check")
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: invalid configuration"));
}

#[test]
fn missing_config_file_fails() {
    let dir = TempDir::new().unwrap();

    cairn()
        .arg("check")
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read cairn.toml"));
}

#[test]
fn unknown_event_type_is_a_usage_error() {
    cairn()
        .args(["watch", "--type", "gossip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("gossip"));
}

#[tokio::test(flavor = "multi_thread")]
async fn publish_sends_event_to_relay() {
    let relay = TestRelay::start().await;
    let dir = TempDir::new().unwrap();
    let config = format!(
        "url = \"{}\"\nuser_id = \"alice\"\nterminal_id = \"alice-laptop\"\n",
        relay.ws_url()
    );
    write_config(&dir, "cairn.toml", &config);

    let cwd = dir.path().to_path_buf();
    tokio::task::spawn_blocking(move || {
        cairn()
            .args([
                "publish",
                "-t",
                "blocker",
                "--title",
                "CI is red",
                "--description",
                "main fails to build",
                "--tag",
                "ci",
                "-p",
                "api",
            ])
            .current_dir(cwd)
            .assert()
            .success()
            .stdout(predicate::str::starts_with("published blocker "));
    })
    .await
    .unwrap();

    wait_until("publish received", || {
        relay
            .received()
            .iter()
            .any(|m| matches!(m, ClientMessage::Publish { .. }))
    })
    .await;
    let received = relay.received();
    let event = received
        .iter()
        .find_map(|m| match m {
            ClientMessage::Publish { event } => Some(event.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(event.event_type(), SyncEventType::Blocker);
    assert_eq!(event.title(), "CI is red");
    assert_eq!(event.user(), "alice");
    assert_eq!(event.terminal_id(), "alice-laptop");
    assert_eq!(event.project(), Some("api"));
    assert!(event.tags().contains("ci"));
    assert_eq!(relay.handshakes()[0].user.as_deref(), Some("alice"));
}

#[test]
fn publish_fails_when_relay_is_unreachable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "cairn.toml",
        &format!("url = \"{}\"\nuser_id = \"alice\"\nterminal_id = \"t1\"\n", url),
    );

    cairn()
        .args(["publish", "-t", "discovery", "--title", "x", "--description", "y"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: connection failed"));
}
