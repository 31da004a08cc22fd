// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection lifecycle state machine.
//!
//! [`Machine::handle`] takes one [`Input`] and returns the [`Action`]s the
//! driver must perform, in order. The machine owns every piece of lifecycle
//! state (connection state, reconnect attempt, keepalive bookkeeping and
//! metrics) and performs no I/O itself, so every transition can be tested
//! without sockets or timers.

use std::fmt;
use std::time::Duration;

use cairn_core::{
    decode_server_frame, ClientMessage, DecodeError, ServerMessage, SyncEvent, SyncEventType,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::ClientConfig;
use crate::dispatcher::Notification;
use crate::error::{ConnectError, Fault};

/// Reason reported when a ping goes unanswered for too long.
pub const KEEPALIVE_TIMEOUT_REASON: &str = "keepalive timeout";

/// Connection state as seen by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    /// Lowercase name as used in logs and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running counters for the client's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    /// Publish envelopes handed to an open transport.
    pub total_events_sent: u64,
    /// Event envelopes decoded from the relay.
    pub total_events_received: u64,
    /// Successful reconnects after an unexpected close.
    pub total_reconnects: u64,
    /// Wall-clock time of the most recent successful open.
    pub last_connect_time: Option<DateTime<Utc>>,
}

/// Something that happened to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Host called `connect()`.
    Connect,
    /// Host called `disconnect()`.
    Disconnect,
    /// The pending open finished successfully.
    Opened,
    /// The pending open failed or timed out.
    OpenFailed(String),
    /// The open transport closed without being asked to.
    Closed(String),
    /// A text frame arrived.
    Frame(String),
    KeepaliveTick,
    ReconnectDue,
    Publish(SyncEvent),
    Subscribe {
        event_types: Vec<SyncEventType>,
        project: Option<String>,
    },
    Unsubscribe {
        event_types: Vec<SyncEventType>,
    },
}

/// Work the driver performs on the machine's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Start opening a transport.
    Open,
    /// Drop any in-flight open.
    AbortOpen,
    /// Close the open transport, if any.
    Close,
    Send(ClientMessage),
    StartKeepalive,
    StopKeepalive,
    /// Replace any pending reconnect timer with one firing after the delay.
    ScheduleReconnect(Duration),
    CancelReconnect,
    Notify(Notification),
    /// Settle every caller waiting on `connect()`.
    ResolveConnect(Result<(), ConnectError>),
    /// Settle only the `connect()` call that produced this input.
    ReplyConnect(Result<(), ConnectError>),
}

/// The connection lifecycle.
#[derive(Debug)]
pub struct Machine {
    config: ClientConfig,
    state: ConnectionState,
    /// Number of the reconnect attempt scheduled or in flight. 0 when not
    /// recovering.
    attempt: u32,
    /// The in-flight or pending open is a reconnect rather than `connect()`.
    reconnecting: bool,
    reconnect_pending: bool,
    /// When the oldest unanswered ping was sent.
    awaiting_pong_since: Option<Instant>,
    last_pong: Option<Instant>,
    metrics: Metrics,
}

impl Machine {
    /// Creates a disconnected machine.
    pub fn new(config: ClientConfig) -> Self {
        Machine {
            config,
            state: ConnectionState::Disconnected,
            attempt: 0,
            reconnecting: false,
            reconnect_pending: false,
            awaiting_pong_since: None,
            last_pong: None,
            metrics: Metrics::default(),
        }
    }

    /// Get the current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get the running counters.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    #[cfg(test)]
    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    #[cfg(test)]
    pub(crate) fn is_reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    #[cfg(test)]
    pub(crate) fn last_pong(&self) -> Option<Instant> {
        self.last_pong
    }

    /// Records that a publish envelope reached the transport.
    pub fn note_published(&mut self) {
        self.metrics.total_events_sent += 1;
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    ///
    /// `reconnect_delay * 2^(attempt - 1)`, capped at `max_reconnect_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let delay_ms = self
            .config
            .reconnect_delay_ms
            .saturating_mul(factor)
            .min(self.config.max_reconnect_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Applies one input and returns the resulting actions.
    pub fn handle(&mut self, input: Input, now: Instant) -> Vec<Action> {
        match input {
            Input::Connect => self.on_connect(),
            Input::Disconnect => self.on_disconnect(),
            Input::Opened => self.on_opened(),
            Input::OpenFailed(reason) => self.on_open_failed(reason),
            Input::Closed(reason) => self.on_closed(reason),
            Input::Frame(text) => self.on_frame(&text, now),
            Input::KeepaliveTick => self.on_keepalive_tick(now),
            Input::ReconnectDue => self.on_reconnect_due(),
            Input::Publish(event) => self.send_if_connected(ClientMessage::publish(event)),
            Input::Subscribe {
                event_types,
                project,
            } => self.send_if_connected(ClientMessage::subscribe(event_types, project)),
            Input::Unsubscribe { event_types } => {
                self.send_if_connected(ClientMessage::unsubscribe(event_types))
            }
        }
    }

    fn set_state(&mut self, state: ConnectionState, actions: &mut Vec<Action>) {
        if self.state != state {
            debug!("connection state: {} -> {}", self.state, state);
            self.state = state;
            actions.push(Action::Notify(Notification::StateChange(state)));
        }
    }

    fn on_connect(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        match self.state {
            ConnectionState::Connected | ConnectionState::Connecting => {
                actions.push(Action::ReplyConnect(Ok(())))
            }
            ConnectionState::Disconnected => {
                if self.reconnect_pending {
                    debug!("connect() supersedes pending reconnect attempt {}", self.attempt);
                    self.reconnect_pending = false;
                    actions.push(Action::CancelReconnect);
                }
                self.attempt = 0;
                self.reconnecting = false;
                self.set_state(ConnectionState::Connecting, &mut actions);
                actions.push(Action::Open);
            }
        }
        actions
    }

    fn on_disconnect(&mut self) -> Vec<Action> {
        let mut actions = vec![
            Action::StopKeepalive,
            Action::CancelReconnect,
            Action::AbortOpen,
            Action::Close,
        ];
        self.attempt = 0;
        self.reconnecting = false;
        self.reconnect_pending = false;
        self.awaiting_pong_since = None;
        self.set_state(ConnectionState::Disconnected, &mut actions);
        actions.push(Action::ResolveConnect(Err(ConnectError::Cancelled)));
        actions
    }

    fn on_opened(&mut self) -> Vec<Action> {
        if self.state != ConnectionState::Connecting {
            debug!("discarding transport opened while {}", self.state);
            return vec![Action::Close];
        }

        let mut actions = Vec::new();
        if self.reconnecting {
            self.metrics.total_reconnects += 1;
            info!("reconnected to relay after {} attempt(s)", self.attempt);
        } else {
            info!("connected to relay at {}", self.config.url);
        }
        self.metrics.last_connect_time = Some(Utc::now());
        self.attempt = 0;
        self.reconnecting = false;
        self.awaiting_pong_since = None;

        self.set_state(ConnectionState::Connected, &mut actions);
        if self.config.keepalive_interval().is_some() {
            actions.push(Action::StartKeepalive);
        }
        actions.push(Action::ResolveConnect(Ok(())));
        actions
    }

    fn on_open_failed(&mut self, reason: String) -> Vec<Action> {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }

        let mut actions = Vec::new();
        self.set_state(ConnectionState::Disconnected, &mut actions);
        if self.reconnecting {
            warn!("reconnect attempt {} failed: {}", self.attempt, reason);
            actions.push(Action::Notify(Notification::Error(Fault::ReconnectFailed {
                attempt: self.attempt,
                reason: reason.clone(),
            })));
            self.schedule_reconnect(&mut actions);
        } else {
            warn!("failed to connect to relay: {}", reason);
        }
        actions.push(Action::ResolveConnect(Err(ConnectError::Failed(reason))));
        actions
    }

    fn on_closed(&mut self, reason: String) -> Vec<Action> {
        if self.state != ConnectionState::Connected {
            return Vec::new();
        }
        let mut actions = Vec::new();
        self.connection_lost(reason, &mut actions);
        actions
    }

    fn connection_lost(&mut self, reason: String, actions: &mut Vec<Action>) {
        warn!("connection to relay lost: {}", reason);
        self.awaiting_pong_since = None;
        actions.push(Action::StopKeepalive);
        self.set_state(ConnectionState::Disconnected, actions);
        actions.push(Action::Notify(Notification::Error(Fault::ConnectionLost {
            reason,
        })));
        if self.config.auto_reconnect {
            self.attempt = 0;
            self.reconnecting = true;
            self.schedule_reconnect(actions);
        }
    }

    /// Schedules the next reconnect attempt, or gives up.
    fn schedule_reconnect(&mut self, actions: &mut Vec<Action>) {
        if let Some(max) = self.config.max_reconnect_attempts {
            if self.attempt >= max {
                warn!("giving up on relay after {} reconnect attempt(s)", self.attempt);
                actions.push(Action::Notify(Notification::Error(
                    Fault::ReconnectExhausted {
                        attempts: self.attempt,
                    },
                )));
                self.attempt = 0;
                self.reconnecting = false;
                return;
            }
        }
        self.attempt += 1;
        self.reconnect_pending = true;
        let delay = self.backoff(self.attempt);
        debug!("reconnect attempt {} in {:?}", self.attempt, delay);
        actions.push(Action::ScheduleReconnect(delay));
    }

    fn on_reconnect_due(&mut self) -> Vec<Action> {
        if !self.reconnect_pending || self.state != ConnectionState::Disconnected {
            return Vec::new();
        }
        self.reconnect_pending = false;
        let mut actions = Vec::new();
        self.set_state(ConnectionState::Connecting, &mut actions);
        actions.push(Action::Open);
        actions
    }

    fn on_frame(&mut self, text: &str, now: Instant) -> Vec<Action> {
        if self.state != ConnectionState::Connected {
            debug!("ignoring frame received while {}", self.state);
            return Vec::new();
        }
        match decode_server_frame(text) {
            Ok(ServerMessage::Event { event }) => {
                self.metrics.total_events_received += 1;
                trace!("received {} event {}", event.event_type(), event.id());
                vec![Action::Notify(Notification::Event(event))]
            }
            Ok(ServerMessage::Ack {
                message_id,
                success,
                error,
            }) => {
                if success {
                    trace!("ack for {}", message_id);
                } else {
                    warn!(
                        "relay rejected {}: {}",
                        message_id,
                        error.as_deref().unwrap_or("no reason given")
                    );
                }
                Vec::new()
            }
            Ok(ServerMessage::Pong) => {
                self.awaiting_pong_since = None;
                self.last_pong = Some(now);
                Vec::new()
            }
            Err(DecodeError::Malformed(detail)) => {
                vec![Action::Notify(Notification::Error(Fault::MalformedFrame {
                    detail,
                }))]
            }
            Err(DecodeError::Unrecognized(kind)) => {
                vec![Action::Notify(Notification::Error(
                    Fault::UnrecognizedMessage { kind },
                ))]
            }
        }
    }

    fn on_keepalive_tick(&mut self, now: Instant) -> Vec<Action> {
        if self.state != ConnectionState::Connected {
            return Vec::new();
        }
        if let (Some(sent), Some(timeout)) =
            (self.awaiting_pong_since, self.config.pong_timeout())
        {
            if now.saturating_duration_since(sent) >= timeout {
                match self.last_pong {
                    Some(at) => debug!(
                        "no pong for {:?}, last one {:?} ago",
                        now.saturating_duration_since(sent),
                        now.saturating_duration_since(at)
                    ),
                    None => debug!("no pong since connecting"),
                }
                let mut actions = vec![Action::Close];
                self.connection_lost(KEEPALIVE_TIMEOUT_REASON.to_string(), &mut actions);
                return actions;
            }
        }
        if self.awaiting_pong_since.is_none() {
            self.awaiting_pong_since = Some(now);
        }
        vec![Action::Send(ClientMessage::ping())]
    }

    fn send_if_connected(&mut self, msg: ClientMessage) -> Vec<Action> {
        if self.state == ConnectionState::Connected {
            vec![Action::Send(msg)]
        } else {
            warn!("dropping {} while {}", msg.kind(), self.state);
            Vec::new()
        }
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
