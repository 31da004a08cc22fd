// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! cairn - real-time sync client for reasoning events.
//!
//! A [`SyncClient`] keeps one WebSocket connection to a relay open, publishes
//! [`SyncEvent`]s (design decisions, discoveries, blockers) and delivers the
//! events other actors publish to registered handlers.
//!
//! # Main Components
//!
//! - [`SyncClient`] - host-facing handle; spawns the driver task
//! - [`machine`] - pure connection lifecycle ([`Machine`], [`Input`], [`Action`])
//! - [`dispatcher`] - per-signal handler registry with panic isolation
//! - [`transport`] - [`Connector`]/[`Transport`] traits and the WebSocket implementation
//! - [`ClientConfig`] - connection parameters, loadable from TOML
//!
//! Failures of `connect()` are returned to the caller. Everything that goes
//! wrong afterwards is delivered as a [`Fault`] on the `Error` signal.

mod cli;
mod commands;

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod machine;
pub mod transport;

pub use cairn_core::{
    decode_server_frame, ClientMessage, DecodeError, ServerMessage, SyncEvent, SyncEventType,
};
pub use cli::{Cli, Command, DEFAULT_CONFIG_FILE};
pub use client::{SyncClient, WeakSyncClient};
pub use config::{AuthMode, ClientConfig};
pub use dispatcher::{Dispatcher, Handler, HandlerId, Notification, Signal};
pub use error::{ConnectError, Fault, SyncError, SyncResult};
pub use machine::{Action, ConnectionState, Input, Machine, Metrics};
pub use transport::{
    Connector, Transport, TransportError, TransportResult, WebSocketConnector,
    WebSocketTransport,
};

use std::path::PathBuf;

use commands::publish::PublishArgs;

/// Runs one CLI command to completion.
pub fn run(cli: Cli) -> SyncResult<()> {
    let path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = ClientConfig::load(&path)?;

    match cli.command {
        Command::Check => commands::check::run(&path, &config),
        Command::Watch {
            event_types,
            project,
        } => runtime()?.block_on(commands::watch::run(config, event_types, project)),
        Command::Publish {
            event_type,
            title,
            description,
            files,
            tags,
            project,
        } => runtime()?.block_on(commands::publish::run(
            config,
            PublishArgs {
                event_type,
                title,
                description,
                files,
                tags,
                project,
            },
        )),
    }
}

fn runtime() -> SyncResult<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
