//! Error types for triage-store

use thiserror::Error;

/// Errors from reading raw tables, the dataset store and model artifacts.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A CSV row could not be read or decoded into its record type.
    #[error("parse error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Stored table does not have the expected layout.
    #[error("malformed table {table}: {reason}")]
    MalformedTable { table: String, reason: String },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("artifact digest mismatch: expected {expected}, found {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("not a model artifact: {0}")]
    InvalidArtifact(String),

    #[error("unsupported artifact format version {found}, expected {expected}")]
    UnsupportedVersion { expected: u16, found: u16 },

    #[error(transparent)]
    Core(#[from] triage_core::TriageError),
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
