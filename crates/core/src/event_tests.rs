// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::TimeZone;
use yare::parameterized;

#[parameterized(
    design_decision = { "design_decision", SyncEventType::DesignDecision },
    discovery = { "discovery", SyncEventType::Discovery },
    blocker = { "blocker", SyncEventType::Blocker },
    uppercase = { "BLOCKER", SyncEventType::Blocker },
    dashed = { "design-decision", SyncEventType::DesignDecision },
)]
fn event_type_from_str(input: &str, expected: SyncEventType) {
    assert_eq!(input.parse::<SyncEventType>().unwrap(), expected);
}

#[test]
fn event_type_from_str_rejects_unknown() {
    let err = "decision".parse::<SyncEventType>().unwrap_err();
    assert!(matches!(err, Error::InvalidEventType(ref s) if s == "decision"));
}

#[test]
fn event_type_display_matches_wire_name() {
    for ty in SyncEventType::ALL {
        let json = serde_json::to_string(&ty).unwrap();
        assert_eq!(json, format!("\"{}\"", ty));
    }
}

#[test]
fn new_event_assigns_id_and_timestamp() {
    let event = SyncEvent::new(
        SyncEventType::DesignDecision,
        "alice",
        "terminal-1",
        "Use PostgreSQL for storage",
        "Better ACID guarantees than the document store",
    )
    .with_file("src/db/mod.rs")
    .with_tag("database")
    .with_project("atlas");

    assert_eq!(event.event_type(), SyncEventType::DesignDecision);
    assert_eq!(event.user(), "alice");
    assert_eq!(event.terminal_id(), "terminal-1");
    assert_eq!(event.files(), ["src/db/mod.rs".to_string()]);
    assert!(event.tags().contains("database"));
    assert_eq!(event.project(), Some("atlas"));
    assert!(uuid::Uuid::parse_str(event.id()).is_ok());
    assert!(event.parsed_timestamp().is_some());
}

#[test]
fn duplicate_tags_collapse() {
    let event = SyncEvent::new(SyncEventType::Blocker, "bob", "t2", "CI red", "")
        .with_tag("ci")
        .with_tag("ci");
    assert_eq!(event.tags().len(), 1);
}

#[test]
fn timestamp_is_not_rewritten_on_decode() {
    let json = r#"{
        "id": "evt-1",
        "event_type": "discovery",
        "user": "carol",
        "terminal_id": "t3",
        "title": "Cache misses",
        "description": "Hot path allocates",
        "files": [],
        "tags": [],
        "timestamp": "2026-03-01T09:30:00.5+02:00"
    }"#;
    let event: SyncEvent = serde_json::from_str(json).unwrap();
    assert_eq!(event.timestamp(), "2026-03-01T09:30:00.5+02:00");
    assert_eq!(
        event.parsed_timestamp().unwrap().offset().local_minus_utc(),
        2 * 3600
    );

    let reencoded = serde_json::to_value(&event).unwrap();
    assert_eq!(reencoded["timestamp"], "2026-03-01T09:30:00.5+02:00");
}

#[test]
fn project_omitted_when_absent() {
    let event = SyncEvent::new(SyncEventType::Discovery, "dave", "t4", "x", "y");
    let value = serde_json::to_value(&event).unwrap();
    assert!(value.get("project").is_none());
}

#[test]
fn missing_files_and_tags_default_to_empty() {
    let json = r#"{"id":"e","event_type":"blocker","user":"u","terminal_id":"t",
        "title":"a","description":"b","timestamp":"not a date"}"#;
    let event: SyncEvent = serde_json::from_str(json).unwrap();
    assert!(event.files().is_empty());
    assert!(event.tags().is_empty());
    assert!(event.parsed_timestamp().is_none());
}

#[test]
fn with_timestamp_and_id_override_defaults() {
    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let event = SyncEvent::new(SyncEventType::Blocker, "u", "t", "a", "b")
        .with_id("fixed")
        .with_timestamp(at);
    assert_eq!(event.id(), "fixed");
    assert_eq!(event.parsed_timestamp().unwrap(), at);
}
