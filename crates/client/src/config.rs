// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! A [`ClientConfig`] is fixed for the lifetime of a client. It can be built
//! in code or read from a TOML file such as:
//!
//! ```toml
//! url = "wss://relay.example.com/sync"
//! token = "…"
//! user_id = "alice"
//! terminal_id = "alice-laptop"
//! max_reconnect_attempts = 5
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// How the client identifies itself to the relay during the handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// `Authorization: Bearer <token>` plus identity headers.
    #[default]
    Header,
    /// `token`, `user` and `terminal` query parameters on the URL.
    Query,
    /// Send no identity; the relay is open or authenticates some other way.
    Anonymous,
}

/// Configuration for the sync client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Relay WebSocket URL (`ws://` or `wss://`).
    #[serde(default = "default_url")]
    pub url: String,
    /// Opaque auth token passed through the handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Identifier of the producing actor.
    pub user_id: String,
    /// Identifier of this session or workstation.
    pub terminal_id: String,
    /// Handshake mechanism.
    #[serde(default)]
    pub auth: AuthMode,
    /// Reconnect after an unexpected close.
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,
    /// Base delay for exponential backoff (milliseconds).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Upper bound on any single backoff delay (milliseconds).
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
    /// Reconnect attempts per drop before giving up. Absent = unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reconnect_attempts: Option<u32>,
    /// Ping interval in milliseconds. 0 = disabled.
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
    /// Age at which an unanswered ping marks the connection dead. 0 = disabled.
    #[serde(default = "default_pong_timeout_ms")]
    pub pong_timeout_ms: u64,
    /// Max time to wait for the transport to open (milliseconds).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Max time a single frame write or close may take (milliseconds).
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

fn default_url() -> String {
    "ws://localhost:43216".to_string()
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1_000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

fn default_keepalive_interval_ms() -> u64 {
    30_000
}

fn default_pong_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_send_timeout_ms() -> u64 {
    5_000
}

impl ClientConfig {
    /// Creates a config with default timings for the given relay and identity.
    pub fn new(
        url: impl Into<String>,
        user_id: impl Into<String>,
        terminal_id: impl Into<String>,
    ) -> Self {
        ClientConfig {
            url: url.into(),
            token: None,
            user_id: user_id.into(),
            terminal_id: terminal_id.into(),
            auth: AuthMode::default(),
            auto_reconnect: default_auto_reconnect(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            max_reconnect_attempts: None,
            keepalive_interval_ms: default_keepalive_interval_ms(),
            pong_timeout_ms: default_pong_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }

    /// Sets the auth token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Parses a config from TOML and validates it.
    pub fn from_toml(content: &str) -> SyncResult<Self> {
        let config: ClientConfig = toml::from_str(content)
            .map_err(|e| SyncError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a config file.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Serializes the config back to TOML.
    pub fn to_toml(&self) -> SyncResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SyncError::Config(format!("failed to serialize config: {}", e)))
    }

    /// Checks value ranges and required fields.
    pub fn validate(&self) -> SyncResult<()> {
        if self.url.is_empty() {
            return Err(SyncError::Config("url cannot be empty".to_string()));
        }
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(SyncError::Config(format!(
                "invalid url '{}': must start with ws:// or wss://",
                self.url
            )));
        }
        if self.user_id.trim().is_empty() {
            return Err(SyncError::Config("user_id cannot be empty".to_string()));
        }
        if self.terminal_id.trim().is_empty() {
            return Err(SyncError::Config("terminal_id cannot be empty".to_string()));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(SyncError::Config(
                "reconnect_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_reconnect_delay_ms < self.reconnect_delay_ms {
            return Err(SyncError::Config(format!(
                "max_reconnect_delay_ms ({}) must be >= reconnect_delay_ms ({})",
                self.max_reconnect_delay_ms, self.reconnect_delay_ms
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(SyncError::Config(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.send_timeout_ms == 0 {
            return Err(SyncError::Config(
                "send_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Base backoff delay.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Backoff cap.
    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms)
    }

    /// `None` when keepalive is disabled.
    pub fn keepalive_interval(&self) -> Option<Duration> {
        (self.keepalive_interval_ms > 0).then(|| Duration::from_millis(self.keepalive_interval_ms))
    }

    /// `None` when dead-connection detection is disabled.
    pub fn pong_timeout(&self) -> Option<Duration> {
        (self.pong_timeout_ms > 0).then(|| Duration::from_millis(self.pong_timeout_ms))
    }

    /// Deadline for opening a transport.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Deadline for one transport write or close.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
