// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages for client-relay communication.
//!
//! Every frame is a JSON object tagged by its `type` field:
//! - Client publishes events and manages its subscriptions
//! - Relay fans events out to subscribers and answers pings

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::event::{SyncEvent, SyncEventType};

/// Messages sent from client to relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Publish an event to every subscriber of its type.
    Publish { event: SyncEvent },

    /// Start receiving the given event types.
    ///
    /// Additive: previously subscribed types stay subscribed.
    Subscribe {
        event_types: Vec<SyncEventType>,
        /// Only deliver events scoped to this project.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project: Option<String>,
    },

    /// Stop receiving the given event types.
    Unsubscribe { event_types: Vec<SyncEventType> },

    /// Keepalive ping, answered with [`ServerMessage::Pong`].
    Ping,
}

/// Messages sent from relay to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// An event published by some client.
    Event { event: SyncEvent },

    /// Delivery confirmation. Reserved; clients take no action on it.
    Ack {
        message_id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Answer to [`ClientMessage::Ping`].
    Pong,
}

impl ClientMessage {
    /// Creates a Publish message.
    pub fn publish(event: SyncEvent) -> Self {
        ClientMessage::Publish { event }
    }

    /// Creates a Subscribe message.
    pub fn subscribe(event_types: Vec<SyncEventType>, project: Option<String>) -> Self {
        ClientMessage::Subscribe {
            event_types,
            project,
        }
    }

    /// Creates an Unsubscribe message.
    pub fn unsubscribe(event_types: Vec<SyncEventType>) -> Self {
        ClientMessage::Unsubscribe { event_types }
    }

    /// Creates a Ping message.
    pub fn ping() -> Self {
        ClientMessage::Ping
    }

    /// The envelope `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Publish { .. } => "publish",
            ClientMessage::Subscribe { .. } => "subscribe",
            ClientMessage::Unsubscribe { .. } => "unsubscribe",
            ClientMessage::Ping => "ping",
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Creates an Event message.
    pub fn event(event: SyncEvent) -> Self {
        ServerMessage::Event { event }
    }

    /// Creates a successful Ack message.
    pub fn ack(message_id: impl Into<String>) -> Self {
        ServerMessage::Ack {
            message_id: message_id.into(),
            success: true,
            error: None,
        }
    }

    /// Creates a Pong message.
    pub fn pong() -> Self {
        ServerMessage::Pong
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Why an inbound frame could not be turned into a [`ServerMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not JSON, not an object, no string `type`, or bad fields for a known type.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Well-formed envelope whose `type` this client does not know.
    #[error("unrecognized message type '{0}'")]
    Unrecognized(String),
}

const SERVER_KINDS: [&str; 3] = ["event", "ack", "pong"];

/// Decodes one inbound text frame.
///
/// Separates payloads that are broken from payloads that are merely unknown,
/// so the caller can report each precisely.
pub fn decode_server_frame(text: &str) -> Result<ServerMessage, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let kind = match value.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(_) => return Err(DecodeError::Malformed("'type' is not a string".into())),
        None if value.is_object() => {
            return Err(DecodeError::Malformed("missing 'type' field".into()))
        }
        None => return Err(DecodeError::Malformed("expected a JSON object".into())),
    };

    if !SERVER_KINDS.contains(&kind.as_str()) {
        return Err(DecodeError::Unrecognized(kind));
    }

    serde_json::from_value(value)
        .map_err(|e| DecodeError::Malformed(format!("invalid '{}' message: {}", kind, e)))
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
