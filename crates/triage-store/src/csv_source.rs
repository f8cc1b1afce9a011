//! Raw table reader for the messages and categories CSV files.

use crate::error::{Result, StoreError};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::info;
use triage_core::{RawCategoryString, RawMessage};

/// Read every row of a headered CSV file into `T`, matching columns by name.
/// Extra columns are ignored.
pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let path_display = path.display().to_string();
    let file = std::fs::File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: T = record.map_err(|source| StoreError::Csv {
            path: path_display.clone(),
            source,
        })?;
        rows.push(row);
    }
    info!(path = %path_display, rows = rows.len(), "Loaded CSV table");
    Ok(rows)
}

/// Messages table: `id`, `message`, optional `original`, `genre`.
pub fn read_messages(path: &Path) -> Result<Vec<RawMessage>> {
    read_table(path)
}

/// Categories table: `id`, `categories`.
pub fn read_categories(path: &Path) -> Result<Vec<RawCategoryString>> {
    read_table(path)
}
