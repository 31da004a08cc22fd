// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for cairn-core operations.

use thiserror::Error;

/// All possible errors that can occur in cairn-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "invalid event type: '{0}'\n  hint: valid types are: design_decision, discovery, blocker"
    )]
    InvalidEventType(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for cairn-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
