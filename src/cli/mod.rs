//! Command-line interface
//!
//! Argument parsing with clap; each subcommand owns its execution logic in a
//! submodule. Defaults mirror the constants in [`crate::config`], so a bare
//! `ingest` invocation crawls the production listing with the documented
//! contract values.

pub mod ingest;

use clap::{Parser, Subcommand};

pub use ingest::IngestArgs;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "trade-results-ingestor",
    about = "Ingest published commodity-exchange trading reports into Postgres",
    version
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl the listing and persist all discovered trade records
    Ingest(IngestArgs),
}
