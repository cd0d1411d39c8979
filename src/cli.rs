use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "refurb-price-tracker")]
#[command(version)]
#[command(about = "Tracks the best-ever prices of refurbished listings per condition tier")]
pub struct Cli {
    /// Configuration file (defaults to ./price-tracker.json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Visit every catalog page once
    Run {
        /// Fetch all pages concurrently
        #[arg(long)]
        parallel: bool,
    },

    /// Keep crawling in passes
    Watch {
        /// Stop after this many passes
        #[arg(long)]
        cycles: Option<u64>,
    },

    /// Process a captured page without fetching and print the outcome
    Replay {
        /// Product group the page belongs to
        #[arg(long)]
        group: String,

        /// URL the page was captured from
        #[arg(long)]
        url: String,

        /// Captured HTML file
        file: PathBuf,
    },

    /// Rebuild the summary file from the history file
    Stats,

    /// Write the default configuration file
    Init,
}
