//! SQLite store for the normalized dataset.
//!
//! One table per dataset: `id`, `message`, `original`, `genre`, then one
//! INTEGER column per label in schema order. Writing replaces the table
//! inside a single transaction.

use crate::error::{Result, StoreError};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::{debug, info};
use triage_core::{LabelSchema, NormalizedDataset, NormalizedRecord, TriageError};

/// Table name used when none is given.
pub const DEFAULT_TABLE: &str = "Data_Table";

/// Columns that are not labels.
pub const RECORD_COLUMNS: [&str; 4] = ["id", "message", "original", "genre"];

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Dataset store backed by one SQLite database file.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Opened SQLite store");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Replace `table` with the contents of `dataset`. Returns rows written.
    pub fn write_dataset(&mut self, table: &str, dataset: &NormalizedDataset) -> Result<usize> {
        let schema = dataset.schema();
        if let Some(clash) = schema
            .names()
            .iter()
            .find(|name| RECORD_COLUMNS.contains(&name.as_str()))
        {
            return Err(StoreError::MalformedTable {
                table: table.to_string(),
                reason: format!("label {clash} collides with a record column"),
            });
        }

        let mut columns = vec![
            "id INTEGER NOT NULL".to_string(),
            "message TEXT NOT NULL".to_string(),
            "original TEXT".to_string(),
            "genre TEXT NOT NULL".to_string(),
        ];
        columns.extend(
            schema
                .names()
                .iter()
                .map(|name| format!("{} INTEGER NOT NULL", quote_ident(name))),
        );
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let table_ident = quote_ident(table);

        let tx = self.conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {table_ident}"), [])?;
        tx.execute(
            &format!("CREATE TABLE {table_ident} ({})", columns.join(", ")),
            [],
        )?;
        {
            let mut insert = tx.prepare(&format!(
                "INSERT INTO {table_ident} VALUES ({})",
                placeholders.join(", ")
            ))?;
            for record in dataset.records() {
                let mut values = Vec::with_capacity(placeholders.len());
                values.push(Value::Integer(record.id));
                values.push(Value::Text(record.message.clone()));
                values.push(record.original.clone().map_or(Value::Null, Value::Text));
                values.push(Value::Text(record.genre.clone()));
                values.extend(record.labels.iter().map(|&v| Value::Integer(i64::from(v))));
                insert.execute(params_from_iter(values.iter()))?;
            }
        }
        tx.commit()?;

        info!(
            table,
            rows = dataset.len(),
            labels = schema.len(),
            "Wrote normalized dataset"
        );
        Ok(dataset.len())
    }

    /// Read `table` back. Every column other than the record columns is a label.
    pub fn read_dataset(&self, table: &str) -> Result<NormalizedDataset> {
        let malformed = |reason: String| StoreError::MalformedTable {
            table: table.to_string(),
            reason,
        };
        let table_ident = quote_ident(table);

        let columns: Vec<String> = self
            .conn
            .prepare(&format!("PRAGMA table_info({table_ident})"))?
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<_>>()?;
        if columns.is_empty() {
            return Err(malformed("table does not exist".to_string()));
        }
        for required in ["id", "message", "genre"] {
            if !columns.iter().any(|c| c == required) {
                return Err(malformed(format!("missing column {required}")));
            }
        }

        let label_names: Vec<String> = columns
            .iter()
            .filter(|c| !RECORD_COLUMNS.contains(&c.as_str()))
            .cloned()
            .collect();
        let schema = LabelSchema::new(label_names).map_err(TriageError::from)?;
        let original = if columns.iter().any(|c| c == "original") {
            "original"
        } else {
            "NULL"
        };

        let mut select = vec![
            "id".to_string(),
            "message".to_string(),
            original.to_string(),
            "genre".to_string(),
        ];
        select.extend(schema.names().iter().map(|n| quote_ident(n)));
        let n_labels = schema.len();

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {table_ident} ORDER BY rowid",
            select.join(", ")
        ))?;
        let rows = stmt
            .query_map([], |row| {
                let labels = (0..n_labels)
                    .map(|j| row.get::<_, i64>(4 + j))
                    .collect::<rusqlite::Result<Vec<i64>>>()?;
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    labels,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (id, message, original, genre, raw_labels) in rows {
            let labels = raw_labels
                .iter()
                .zip(schema.names())
                .map(|(&v, name)| match v {
                    0 | 1 => Ok(v as u8),
                    _ => Err(malformed(format!("row {id}: label {name} has value {v}"))),
                })
                .collect::<Result<Vec<u8>>>()?;
            records.push(NormalizedRecord {
                id,
                message,
                original,
                genre,
                labels,
            });
        }

        info!(table, rows = records.len(), labels = n_labels, "Loaded normalized dataset");
        Ok(NormalizedDataset::new(schema, records)?)
    }
}
