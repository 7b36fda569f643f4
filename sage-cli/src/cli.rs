//! ABOUTME: Command-line argument parsing for the `sage` binary

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "sage", about = "SAGE RAG serving core", version)]
pub struct Cli {
    /// Path to a TOML configuration file; falls back to defaults and
    /// `SAGE__`-prefixed environment overrides when absent.
    #[arg(long, global = true, env = "SAGE_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP and gRPC servers.
    Serve,
    /// Bulk-ingest question/answer pairs into a class collection.
    Index(IndexArgs),
}

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// Class collection to ingest into (1..=12).
    #[arg(long)]
    pub class_num: u8,

    /// Path to a JSON file containing an array of ingestion items.
    #[arg(long)]
    pub input: PathBuf,

    /// Also index a paraphrased variant of each item, per
    /// `batch_index_questions`'s `paraphrase` flag.
    #[arg(long, default_value_t = false)]
    pub paraphrase: bool,
}
