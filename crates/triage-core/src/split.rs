//! Seeded train/test split.

use crate::error::{Result, TriageError};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of the two halves of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n` with `seed` and hold out `ceil(test_size * n)` rows.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> Result<SplitIndices> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(TriageError::Config(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }
    if n == 0 {
        return Err(TriageError::Data("cannot split an empty dataset".to_string()));
    }
    let n_test = ((test_size * n as f64).ceil() as usize).min(n);
    if n_test == n {
        return Err(TriageError::Data(format!(
            "test_size {test_size} leaves no training rows out of {n}"
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
    let train = order.split_off(n_test);
    Ok(SplitIndices { train, test: order })
}
