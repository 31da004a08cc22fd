// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use cairn_core::SyncEventType;
use clap::{Parser, Subcommand};

/// Config file looked up in the working directory when `-c` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "cairn.toml";

#[derive(Parser, Debug)]
#[command(name = "cairn")]
#[command(version)]
#[command(about = "Share design decisions, discoveries and blockers in real time")]
pub struct Cli {
    /// Path to the client config file [default: ./cairn.toml]
    #[arg(long, short, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log connection activity to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print events from the relay as JSON lines until interrupted
    #[command(after_help = "Examples:\n  \
        cairn watch                          Watch every event type\n  \
        cairn watch --type blocker           Watch blockers only\n  \
        cairn watch -t discovery -p api      Discoveries in project 'api'")]
    Watch {
        /// Event type to receive (repeatable) [default: all]
        #[arg(long = "type", short = 't', value_name = "TYPE")]
        event_types: Vec<SyncEventType>,

        /// Only receive events scoped to this project
        #[arg(long, short)]
        project: Option<String>,
    },

    /// Publish one event
    #[command(after_help = "Examples:\n  \
        cairn publish -t blocker --title \"CI red\" --description \"main fails\"\n  \
        cairn publish -t design_decision --title \"Use WAL\" \\\n    \
        --description \"avoids writer starvation\" --file src/db.rs --tag storage")]
    Publish {
        /// Event type (design_decision, discovery, blocker)
        #[arg(long = "type", short = 't', value_name = "TYPE")]
        event_type: SyncEventType,

        /// One-line summary
        #[arg(long)]
        title: String,

        /// Free-form detail
        #[arg(long)]
        description: String,

        /// Related file path (repeatable)
        #[arg(long = "file", short = 'f', value_name = "PATH")]
        files: Vec<String>,

        /// Tag (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,

        /// Project scope
        #[arg(long, short)]
        project: Option<String>,
    },

    /// Validate the config file and print the effective settings
    Check,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
