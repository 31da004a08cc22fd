// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! cairn-core: Shared library for cairn reasoning-event sync
//!
//! This crate provides the event data model and the JSON wire protocol
//! spoken between cairn clients and the relay. It performs no I/O.

pub mod error;
pub mod event;
pub mod protocol;

pub use error::{Error, Result};
pub use event::{SyncEvent, SyncEventType};
pub use protocol::{decode_server_frame, ClientMessage, DecodeError, ServerMessage};
