// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use clap::CommandFactory;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn watch_collects_repeated_types() {
    let cli = Cli::try_parse_from([
        "cairn", "watch", "--type", "blocker", "-t", "Discovery", "-p", "api",
    ])
    .unwrap();
    match cli.command {
        Command::Watch {
            event_types,
            project,
        } => {
            assert_eq!(
                event_types,
                vec![SyncEventType::Blocker, SyncEventType::Discovery]
            );
            assert_eq!(project.as_deref(), Some("api"));
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["cairn", "check", "-c", "relay.toml", "-v"]).unwrap();
    assert_eq!(cli.config, Some(PathBuf::from("relay.toml")));
    assert!(cli.verbose);
}

#[test]
fn publish_requires_title_and_description() {
    let err = Cli::try_parse_from(["cairn", "publish", "--type", "blocker", "--title", "x"])
        .unwrap_err();
    assert!(err.to_string().contains("--description"));
}

#[test]
fn publish_rejects_unknown_type() {
    let err = Cli::try_parse_from([
        "cairn",
        "publish",
        "--type",
        "rumor",
        "--title",
        "x",
        "--description",
        "y",
    ])
    .unwrap_err();
    assert!(err.to_string().contains("rumor"));
}
