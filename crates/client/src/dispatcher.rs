// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Host-facing notification fan-out.
//!
//! Handlers are registered per [`Signal`] and invoked synchronously, in
//! registration order, on the client's driver task. A handler that panics
//! is isolated: later handlers still run, and the panic is reported as a
//! [`Fault::HandlerPanicked`] on the `Error` signal.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use cairn_core::SyncEvent;

use crate::error::Fault;
use crate::machine::ConnectionState;

/// A named channel hosts can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// An event arrived from the relay.
    Event,
    /// A recoverable fault occurred.
    Error,
    /// The connection state changed.
    StateChange,
}

impl Signal {
    /// Lowercase signal name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Event => "event",
            Signal::Error => "error",
            Signal::StateChange => "state_change",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload delivered to handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Event(SyncEvent),
    Error(Fault),
    StateChange(ConnectionState),
}

impl Notification {
    /// The signal this notification is delivered on.
    pub fn signal(&self) -> Signal {
        match self {
            Notification::Event(_) => Signal::Event,
            Notification::Error(_) => Signal::Error,
            Notification::StateChange(_) => Signal::StateChange,
        }
    }
}

/// Identifies a registered handler so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// A notification callback.
pub type Handler = Arc<dyn Fn(&Notification) + Send + Sync>;

struct Registration {
    id: HandlerId,
    signal: Signal,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<Registration>,
}

/// Per-signal handler registry.
#[derive(Default)]
pub struct Dispatcher {
    registry: Mutex<Registry>,
}

impl Dispatcher {
    /// Creates a dispatcher with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `signal`.
    pub fn on(&self, signal: Signal, handler: Handler) -> HandlerId {
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = HandlerId(registry.next_id);
        registry.entries.push(Registration {
            id,
            signal,
            handler,
        });
        id
    }

    /// Removes a handler. Returns `false` if it was not registered for `signal`.
    pub fn off(&self, signal: Signal, id: HandlerId) -> bool {
        let mut registry = self.lock();
        let before = registry.entries.len();
        registry
            .entries
            .retain(|entry| !(entry.id == id && entry.signal == signal));
        registry.entries.len() != before
    }

    /// Number of handlers registered for `signal`.
    #[cfg(test)]
    pub(crate) fn handler_count(&self, signal: Signal) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|entry| entry.signal == signal)
            .count()
    }

    /// Delivers `notification` to every handler registered for its signal.
    ///
    /// The handler list is snapshotted first, so handlers may register or
    /// remove handlers without affecting the current delivery.
    pub fn emit(&self, notification: &Notification) {
        let signal = notification.signal();
        let handlers = self.snapshot(signal);
        let mut panics = Vec::new();

        for handler in handlers {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(notification))) {
                let message = panic_message(payload.as_ref());
                if signal == Signal::Error {
                    // No further reporting path for error handlers.
                    tracing::error!("error handler panicked: {}", message);
                } else {
                    tracing::warn!("{} handler panicked: {}", signal, message);
                    panics.push(message);
                }
            }
        }

        for message in panics {
            self.emit(&Notification::Error(Fault::HandlerPanicked { signal, message }));
        }
    }

    fn snapshot(&self, signal: Signal) -> Vec<Handler> {
        self.lock()
            .entries
            .iter()
            .filter(|entry| entry.signal == signal)
            .map(|entry| Arc::clone(&entry.handler))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.lock().entries.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
