// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use cairn_core::{SyncEvent, SyncEventType};

use crate::client::SyncClient;
use crate::config::ClientConfig;
use crate::error::{ConnectError, SyncResult};

/// Fields of the event to publish, as given on the command line.
#[derive(Debug)]
pub struct PublishArgs {
    pub event_type: SyncEventType,
    pub title: String,
    pub description: String,
    pub files: Vec<String>,
    pub tags: Vec<String>,
    pub project: Option<String>,
}

pub(crate) fn build_event(config: &ClientConfig, args: PublishArgs) -> SyncEvent {
    let mut event = SyncEvent::new(
        args.event_type,
        &config.user_id,
        &config.terminal_id,
        args.title,
        args.description,
    );
    for file in args.files {
        event = event.with_file(file);
    }
    for tag in args.tags {
        event = event.with_tag(tag);
    }
    if let Some(project) = args.project {
        event = event.with_project(project);
    }
    event
}

pub async fn run(config: ClientConfig, args: PublishArgs) -> SyncResult<()> {
    let event = build_event(&config, args);
    let client = SyncClient::new(config)?;
    client.connect().await?;

    client.publish(event.clone())?;
    client.flush().await?;
    let sent = client.metrics().total_events_sent;

    client.disconnect()?;
    client.flush().await?;

    if sent == 0 {
        return Err(
            ConnectError::Failed("connection lost before the event was sent".into()).into(),
        );
    }
    println!("published {} {}", event.event_type(), event.id());
    Ok(())
}

#[cfg(test)]
#[path = "publish_tests.rs"]
mod tests;
