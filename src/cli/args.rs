//! Command line argument parsing using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Tessera - build and query on-disk search indexes
#[derive(Parser, Debug, Clone)]
#[command(name = "tessera")]
#[command(about = "Build and query forward and reverse search indexes")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct TesseraArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl TesseraArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build forward and reverse indexes from a journal
    Build(BuildArgs),

    /// Show what the forward index holds for one document
    Inspect(InspectArgs),

    /// Rank the documents matching a set of terms
    Search(SearchArgs),

    /// Show page statistics of a journal
    #[command(name = "journal-info")]
    JournalInfo(JournalInfoArgs),

    /// Write a journal from JSON lines documents
    #[command(name = "journal-import")]
    JournalImport(JournalImportArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    /// Journal directory to read
    #[arg(value_name = "JOURNAL_DIR")]
    pub journal: PathBuf,

    /// Directory receiving the index files
    #[arg(value_name = "INDEX_DIR")]
    pub index_dir: PathBuf,

    /// Domain rankings file (JSON)
    #[arg(short, long, value_name = "RANKINGS_FILE")]
    pub rankings: Option<PathBuf>,

    /// Index configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct InspectArgs {
    #[arg(value_name = "INDEX_DIR")]
    pub index_dir: PathBuf,

    /// Domain id of the document
    #[arg(long, requires = "ordinal", conflicts_with = "id")]
    pub domain: Option<i32>,

    /// Ordinal of the document within its domain
    #[arg(long, requires = "domain")]
    pub ordinal: Option<i32>,

    /// Combined document id
    #[arg(long)]
    pub id: Option<i64>,

    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    #[arg(value_name = "INDEX_DIR")]
    pub index_dir: PathBuf,

    /// Query text, tokenized the same way as imported documents
    #[arg(value_name = "QUERY", required = true)]
    pub query: Vec<String>,

    /// Match documents containing any term instead of all of them
    #[arg(long)]
    pub any: bool,

    /// Maximum number of results to return
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct JournalInfoArgs {
    #[arg(value_name = "JOURNAL_DIR")]
    pub journal: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct JournalImportArgs {
    /// JSON lines file, one document per line
    #[arg(value_name = "DOCUMENT_FILE")]
    pub input: PathBuf,

    /// Journal directory to create
    #[arg(value_name = "JOURNAL_DIR")]
    pub journal: PathBuf,

    /// Documents per journal page (defaults to the configured page size)
    #[arg(short, long)]
    pub page_size: Option<usize>,

    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
