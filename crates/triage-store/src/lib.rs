//! triage-store: persistence adapters for the triage pipeline.
//!
//! - raw message/category CSV tables in
//! - normalized dataset to and from a SQLite table
//! - trained model as a checksummed binary artifact
//! - evaluation results as JSON

mod atomic;
pub mod csv_source;
pub mod error;
pub mod model_artifact;
pub mod report;
pub mod sqlite;

pub use csv_source::{read_categories, read_messages, read_table};
pub use error::{Result, StoreError};
pub use model_artifact::{decode_model, encode_model, load_model, save_model, ArtifactInfo};
pub use report::{read_evaluation_json, write_evaluation_json, EvaluationDocument};
pub use sqlite::{SqliteStore, DEFAULT_TABLE};
