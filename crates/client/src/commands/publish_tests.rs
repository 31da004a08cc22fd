// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

#[test]
fn build_event_uses_config_identity() {
    let config = ClientConfig::new("ws://relay.test", "alice", "alice-laptop");
    let event = build_event(
        &config,
        PublishArgs {
            event_type: SyncEventType::Discovery,
            title: "Flaky test".into(),
            description: "times out under load".into(),
            files: vec!["tests/load.rs".into(), "src/pool.rs".into()],
            tags: vec!["ci".into(), "ci".into()],
            project: Some("api".into()),
        },
    );

    assert_eq!(event.user(), "alice");
    assert_eq!(event.terminal_id(), "alice-laptop");
    assert_eq!(event.event_type(), SyncEventType::Discovery);
    assert_eq!(event.files(), ["tests/load.rs", "src/pool.rs"]);
    assert_eq!(event.tags().len(), 1);
    assert_eq!(event.project(), Some("api"));
    assert!(event.parsed_timestamp().is_some());
}
