//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Airsync - one-way Airtable to content-store synchronization
#[derive(Parser, Debug)]
#[command(name = "airsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (default: ./airsync.json)
    #[arg(long, global = true, env = "AIRSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database path (default: airsync.db beside the config file)
    #[arg(long, global = true, env = "AIRSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON (for scripted consumers)
    #[arg(long, global = true)]
    pub json: bool,

    /// Count and log what a sync would do without writing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and register the configured content model
    Init,

    /// Sync configured tables into the content store
    Sync {
        /// Sync only the mapping with this source table id
        table_id: Option<String>,
    },

    /// Check credentials and table mappings against the content model
    Validate,

    /// List configured table mappings
    List,

    /// Print version information
    Version,
}
