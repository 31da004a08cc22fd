// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reasoning events shared between collaborating terminals.
//!
//! A [`SyncEvent`] records one reasoning act (a design decision, a discovery,
//! a blocker) together with who produced it and where. Events are built once
//! by their producer and travel unchanged through the relay to every
//! subscriber.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Category of a reasoning event.
///
/// The set is closed; adding a category is a protocol change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEventType {
    /// Architecture, API, or data model decision.
    DesignDecision,
    /// Insight worth sharing (performance, security risk, better approach).
    Discovery,
    /// Something preventing progress (build error, missing dependency, unclear requirement).
    Blocker,
}

impl SyncEventType {
    /// Every event type, in declaration order.
    pub const ALL: [SyncEventType; 3] = [
        SyncEventType::DesignDecision,
        SyncEventType::Discovery,
        SyncEventType::Blocker,
    ];

    /// Returns the string representation used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncEventType::DesignDecision => "design_decision",
            SyncEventType::Discovery => "discovery",
            SyncEventType::Blocker => "blocker",
        }
    }
}

impl fmt::Display for SyncEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncEventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "design_decision" => Ok(SyncEventType::DesignDecision),
            "discovery" => Ok(SyncEventType::Discovery),
            "blocker" => Ok(SyncEventType::Blocker),
            _ => Err(Error::InvalidEventType(s.to_string())),
        }
    }
}

/// An immutable record of a reasoning act.
///
/// The `id` and `timestamp` are assigned by the producer. Neither the relay
/// nor the client rewrites them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    id: String,
    event_type: SyncEventType,
    user: String,
    terminal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project: Option<String>,
    title: String,
    description: String,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    tags: BTreeSet<String>,
    timestamp: String,
}

impl SyncEvent {
    /// Creates a new event with a fresh UUID and the current UTC time.
    pub fn new(
        event_type: SyncEventType,
        user: impl Into<String>,
        terminal_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        SyncEvent {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            user: user.into(),
            terminal_id: terminal_id.into(),
            project: None,
            title: title.into(),
            description: description.into(),
            files: Vec::new(),
            tags: BTreeSet::new(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Replaces the generated id with a producer-chosen one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Replaces the generated timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp.to_rfc3339();
        self
    }

    /// Adds a related file path.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.files.push(file.into());
        self
    }

    /// Adds a tag. Duplicate tags collapse.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Scopes the event to a project.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Get the event id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the event type.
    pub fn event_type(&self) -> SyncEventType {
        self.event_type
    }

    /// Get the producing user.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Get the producing terminal.
    pub fn terminal_id(&self) -> &str {
        &self.terminal_id
    }

    /// Get the project scope, if any.
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Get the one-line summary.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Get the free-form detail.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Get related file paths.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Get the tags.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// The producer-assigned timestamp exactly as received.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Parses the timestamp, keeping the producer's offset.
    ///
    /// Returns `None` if the producer sent something that is not RFC 3339.
    pub fn parsed_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.timestamp).ok()
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
