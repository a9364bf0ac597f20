//! CLI definitions for Caretaker.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Caretaker CLI.
#[derive(Parser)]
#[command(name = "caretaker")]
#[command(about = "Health supervisor and backup orchestrator for a managed data service")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CARETAKER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Root directory for logs, backups and state (overrides the config)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Probe the service, restart it if needed and run a catch-up backup
    HealthCheck,

    /// Check memory usage against the threshold (exit code 2 when exceeded)
    MemoryAlert {
        /// Threshold percent, overriding the configured one
        threshold: Option<f64>,
    },

    /// Snapshot the volume and apply retention
    Backup,

    /// Mirror the source tree and ask the service to reindex
    SyncAndIndex,

    /// Restore a snapshot into the volume
    Restore {
        /// Snapshot file name (default: newest)
        snapshot: Option<String>,
    },

    /// List snapshots, newest first
    ListBackups {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Show process, backup and restart status
    Status {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}
