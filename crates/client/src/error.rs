// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the sync client.
//!
//! Only [`SyncError`] is ever returned from a call. Faults that happen while
//! the client runs on its own are delivered as [`Fault`] values on the
//! `Error` signal instead.

use thiserror::Error;

use crate::dispatcher::Signal;

/// Why a `connect()` call did not reach `Connected`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// The transport could not be opened.
    #[error("connection failed: {0}")]
    Failed(String),

    /// `disconnect()` was called before the attempt finished.
    #[error("connection attempt cancelled")]
    Cancelled,
}

/// All possible errors returned by sync client operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A client was created outside a tokio runtime.
    #[error("no tokio runtime: {0}")]
    Runtime(String),

    /// The client's driver task is gone (runtime shut down).
    #[error("sync client is closed")]
    Closed,
}

/// Result type for sync client operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// A recoverable fault reported through the `Error` signal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("malformed frame from relay: {detail}")]
    MalformedFrame { detail: String },

    #[error("unrecognized message type '{kind}' from relay")]
    UnrecognizedMessage { kind: String },

    /// The transport closed without `disconnect()` being called.
    #[error("connection lost: {reason}")]
    ConnectionLost { reason: String },

    #[error("reconnect attempt {attempt} failed: {reason}")]
    ReconnectFailed { attempt: u32, reason: String },

    #[error("giving up after {attempts} reconnect attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("{signal} handler panicked: {message}")]
    HandlerPanicked { signal: Signal, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
