// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::SyncResult;

const REDACTED: &str = "<redacted>";

pub fn run(path: &Path, config: &ClientConfig) -> SyncResult<()> {
    print!("{}", render(path, config)?);
    Ok(())
}

/// The report printed by `cairn check`. The token is never echoed.
pub(crate) fn render(path: &Path, config: &ClientConfig) -> SyncResult<String> {
    let mut shown = config.clone();
    if shown.token.is_some() {
        shown.token = Some(REDACTED.to_string());
    }
    Ok(format!("config ok: {}\n\n{}", path.display(), shown.to_toml()?))
}

#[cfg(test)]
#[path = "check_tests.rs"]
mod tests;
