//! EntryLog CLI
//!
//! Command-line tools for EntryLog directories.
//!
//! # Commands
//!
//! - `inspect` - Display entry files and index statistics
//! - `verify` - Verify entry file headers, frames and the index
//! - `dump` - Dump the frames of one entry file
//! - `compact` - Compact the position index

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// EntryLog command-line tools.
#[derive(Parser)]
#[command(name = "entrylog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display entry files and index statistics
    Inspect {
        /// Show per-file details
        #[arg(short, long)]
        files: bool,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Verify log integrity
    Verify {
        /// Check entry files
        #[arg(short, long)]
        entries: bool,

        /// Check the index
        #[arg(short, long)]
        index: bool,
    },

    /// Dump the frames of one entry file
    Dump {
        /// Entry file id
        #[arg(long)]
        file: u64,

        /// Maximum number of frames to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Bytes of each payload to show as hex
        #[arg(long, default_value = "16")]
        preview: usize,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Compact the position index
    Compact,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { files, format } => {
            let path = cli.path.ok_or("Log path required for inspect")?;
            commands::inspect::run(&path, files, &format)?;
        }
        Commands::Verify { entries, index } => {
            let path = cli.path.ok_or("Log path required for verify")?;
            let check_all = !entries && !index;
            commands::verify::run(&path, entries || check_all, index || check_all)?;
        }
        Commands::Dump {
            file,
            limit,
            preview,
            format,
        } => {
            let path = cli.path.ok_or("Log path required for dump")?;
            commands::dump::run(&path, file, limit, preview, &format)?;
        }
        Commands::Compact => {
            let path = cli.path.ok_or("Log path required for compact")?;
            commands::compact::run(&path)?;
        }
        Commands::Version => {
            println!("EntryLog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("EntryLog Core v{}", entrylog_core::VERSION);
        }
    }

    Ok(())
}
