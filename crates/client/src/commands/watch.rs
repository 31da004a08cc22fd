// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use cairn_core::SyncEventType;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::client::SyncClient;
use crate::config::ClientConfig;
use crate::error::{ConnectError, Fault, SyncError, SyncResult};
use crate::machine::ConnectionState;

pub async fn run(
    config: ClientConfig,
    event_types: Vec<SyncEventType>,
    project: Option<String>,
) -> SyncResult<()> {
    let event_types = if event_types.is_empty() {
        SyncEventType::ALL.to_vec()
    } else {
        event_types
    };

    let client = SyncClient::new(config)?;
    client.on_event(|event| match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("failed to encode event {}: {}", event.id(), e),
    });

    let gave_up = Arc::new(Notify::new());
    {
        let gave_up = Arc::clone(&gave_up);
        client.on_error(move |fault| {
            warn!("{}", fault);
            if matches!(fault, Fault::ReconnectExhausted { .. }) {
                gave_up.notify_one();
            }
        });
    }

    // The relay forgets subscriptions when a connection drops.
    let resubscribe = client.downgrade();
    client.on_state_change(move |state| {
        info!("relay connection {}", state);
        if state != ConnectionState::Connected {
            return;
        }
        if let Some(client) = resubscribe.upgrade() {
            if let Err(e) = client.subscribe(event_types.clone(), project.clone()) {
                warn!("failed to subscribe: {}", e);
            }
        }
    });

    client.connect().await?;

    let outcome: SyncResult<()> = tokio::select! {
        result = tokio::signal::ctrl_c() => result.map_err(SyncError::from),
        _ = gave_up.notified() => {
            Err(ConnectError::Failed("gave up reconnecting to relay".into()).into())
        }
    };

    client.disconnect()?;
    client.flush().await?;
    outcome
}
