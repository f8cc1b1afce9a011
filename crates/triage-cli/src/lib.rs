//! Command implementations behind the `process-data` and `train-classifier`
//! binaries.

pub mod process;
pub mod train;
