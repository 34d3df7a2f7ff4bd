//! qcsync CLI
//!
//! Command-line tools for qcsync stores.
//!
//! # Commands
//!
//! - `inspect` - Display the watermark and outbox
//! - `pending` - Print the envelope the next sync round would send
//! - `clear-outbox` - Discard pending writes

mod commands;

use clap::{Parser, Subcommand};
use commands::Format;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// qcsync command-line store tools.
#[derive(Parser)]
#[command(name = "qcsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite store
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
    /// Display the watermark and outbox
    Inspect {
        /// List every pending record
        #[arg(short, long)]
        records: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the envelope the next sync round would send
    Pending {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Discard every pending write
    ClearOutbox {
        /// Confirm discarding a non-empty outbox
        #[arg(short, long)]
        yes: bool,
    },

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
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Inspect { records, format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, records, Format::parse(&format)?, &mut out)?;
        }
        Commands::Pending { pretty } => {
            let path = cli.path.ok_or("Store path required for pending")?;
            commands::pending::run(&path, pretty, &mut out)?;
        }
        Commands::ClearOutbox { yes } => {
            let path = cli.path.ok_or("Store path required for clear-outbox")?;
            commands::clear_outbox::run(&path, yes, &mut out)?;
        }
        Commands::Version => {
            println!("qcsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("qcsync core v{}", qcsync_core::VERSION);
        }
    }

    Ok(())
}
