//! `process-data`: raw CSV tables in, normalized SQLite table out.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use triage_core::normalize;
use triage_store::{read_categories, read_messages, SqliteStore, DEFAULT_TABLE};

#[derive(Parser, Debug)]
#[command(name = "process-data")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Merge and clean raw messages and categories into a SQLite table", long_about = None)]
pub struct ProcessArgs {
    /// Messages CSV (id, message, original, genre)
    pub messages: PathBuf,

    /// Categories CSV (id, categories)
    pub categories: PathBuf,

    /// SQLite database to write
    pub database: PathBuf,

    /// Table to replace with the cleaned dataset
    #[arg(long, env = "TRIAGE_TABLE", default_value = DEFAULT_TABLE)]
    pub table: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    pub json: bool,
}

/// What a successful run wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub rows: usize,
    pub labels: usize,
}

pub fn run(args: &ProcessArgs) -> Result<ProcessSummary> {
    info!(
        messages = %args.messages.display(),
        categories = %args.categories.display(),
        "Loading data"
    );
    let messages = read_messages(&args.messages)
        .with_context(|| format!("Failed to read messages from {}", args.messages.display()))?;
    let categories = read_categories(&args.categories).with_context(|| {
        format!("Failed to read categories from {}", args.categories.display())
    })?;

    info!("Cleaning data");
    let dataset = normalize(&messages, &categories).context("Failed to normalize dataset")?;

    info!(database = %args.database.display(), table = %args.table, "Saving data");
    let mut store = SqliteStore::open(&args.database)
        .with_context(|| format!("Failed to open database {}", args.database.display()))?;
    let rows = store
        .write_dataset(&args.table, &dataset)
        .with_context(|| format!("Failed to write table {}", args.table))?;

    Ok(ProcessSummary {
        rows,
        labels: dataset.schema().len(),
    })
}
