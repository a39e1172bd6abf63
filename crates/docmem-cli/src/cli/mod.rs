//! CLI command definitions for the `docmem` binary.
//!
//! Maintenance surface over the configured collection: expiration sweeps,
//! index verification and collection housekeeping.

pub mod maintenance;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Maintain a docmem long-term-memory collection.
#[derive(Parser)]
#[command(name = "docmem", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory holding docmem.toml (default: ~/.docmem).
    #[arg(long, global = true, env = "DOCMEM_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Delete every memory whose expiration has passed.
    #[command(name = "reap-expired")]
    ReapExpired {
        /// Sweep as of this Unix timestamp instead of the current time.
        #[arg(long)]
        now: Option<i64>,
    },

    /// Verify (or create) the vector index of the configured collection.
    #[command(name = "ensure-index")]
    EnsureIndex,

    /// Show document count and size of a collection.
    Info {
        /// Collection to inspect (default: the configured one).
        #[arg(long)]
        collection: Option<String>,
    },

    /// List the collections of the configured database.
    #[command(alias = "ls")]
    Collections,

    /// Drop and recreate the configured collection with its index.
    Reset {
        /// Required: every stored memory is deleted.
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration.
    Config,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
