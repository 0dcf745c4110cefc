//! CLI parse: clap types for querylab. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// querylab - GraphQL query workbench
#[derive(Parser)]
#[command(name = "querylab")]
#[command(about = "Run GraphQL queries, switch session identities and share snapshots")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (when output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute the query document against the endpoint
    Run {
        /// Query file, or "-" for stdin (defaults to the saved query)
        #[arg(long)]
        query: Option<String>,
        /// Variables JSON, or @file
        #[arg(long)]
        variables: Option<String>,
        /// Operation to run
        #[arg(long)]
        operation: Option<String>,
        /// Run the operation under LINE:COL
        #[arg(long)]
        cursor: Option<String>,
        /// Report `_gtrace` diagnostics after the response
        #[arg(long)]
        trace: bool,
    },
    /// Show the operations and variable types of a query document
    Facts {
        /// Query file, or "-" for stdin (defaults to the saved query)
        #[arg(long)]
        query: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Introspect the endpoint schema
    Introspect {
        /// Write the introspection result to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Manage the mobile session identity
    Mobile {
        #[command(subcommand)]
        command: MobileCommands,
    },
    /// Share or open snapshots
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },
    /// Inspect or write configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum MobileCommands {
    /// Switch to mobile identity with the given header overrides
    Activate {
        /// Header override NAME=VALUE (repeatable)
        #[arg(long = "header", short = 'H')]
        headers: Vec<String>,
    },
    /// Switch back to browser identity, reissuing captured cookies
    Deactivate,
    /// Show the active identity
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Save the current interaction and print its share URL
    Share {
        /// Query file, or "-" for stdin (defaults to the saved query)
        #[arg(long)]
        query: Option<String>,
        /// Variables JSON, or @file
        #[arg(long)]
        variables: Option<String>,
    },
    /// Restore a snapshot by id or share URL
    Open {
        /// Snapshot id or share URL
        target: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Write the effective configuration to config/config.toml in the workspace
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
