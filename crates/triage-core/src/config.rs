//! Training configuration.
//!
//! Every field has a default, so an empty TOML document (or no file at all)
//! trains with the stock grid:
//!
//! ```toml
//! test_size = 0.2
//! seed = 42
//!
//! [search]
//! n_estimators = [10, 50]
//! max_depth = [0]          # 0 = grow until pure
//! min_samples_split = [2]
//! cv_folds = 5
//!
//! [forest]
//! bootstrap = true
//! max_features = "sqrt"
//! ```

use crate::error::{Result, TriageError};
use crate::forest::{ForestParams, MaxFeatures};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hyperparameter grid and cross-validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub n_estimators: Vec<usize>,
    /// Depth limits to try; `0` means unlimited.
    pub max_depth: Vec<usize>,
    pub min_samples_split: Vec<usize>,
    /// Number of contiguous cross-validation folds.
    pub cv_folds: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_estimators: vec![10, 50],
            max_depth: vec![0],
            min_samples_split: vec![2],
            cv_folds: 5,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators.is_empty()
            || self.max_depth.is_empty()
            || self.min_samples_split.is_empty()
        {
            return Err(TriageError::Fit("hyperparameter grid is empty".to_string()));
        }
        if self.n_estimators.contains(&0) {
            return Err(TriageError::Fit("n_estimators must be positive".to_string()));
        }
        if self.min_samples_split.iter().any(|&m| m < 2) {
            return Err(TriageError::Fit(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.cv_folds < 2 {
            return Err(TriageError::Config(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        Ok(())
    }

    /// Number of grid points.
    pub fn grid_size(&self) -> usize {
        self.n_estimators.len() * self.max_depth.len() * self.min_samples_split.len()
    }
}

/// Settings shared by every forest in the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub bootstrap: bool,
    pub max_features: MaxFeatures,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            bootstrap: true,
            max_features: MaxFeatures::Sqrt,
        }
    }
}

/// Everything `train-classifier` needs besides its paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of the dataset held out for evaluation.
    pub test_size: f64,
    /// Seed for the split and every forest.
    pub seed: u64,
    /// Worker threads; `None` uses the global rayon pool.
    pub threads: Option<usize>,
    pub search: SearchConfig,
    pub forest: ForestConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            threads: None,
            search: SearchConfig::default(),
            forest: ForestConfig::default(),
        }
    }
}

impl TrainingConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(TriageError::Config(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.threads == Some(0) {
            return Err(TriageError::Config("threads must be positive".to_string()));
        }
        self.search.validate()
    }

    /// Every grid point as forest parameters, ordered by depth, then split
    /// size, then tree count.
    pub fn candidates(&self) -> Result<Vec<ForestParams>> {
        self.search.validate()?;
        let mut out = Vec::with_capacity(self.search.grid_size());
        for &depth in &self.search.max_depth {
            for &min_samples_split in &self.search.min_samples_split {
                for &n_estimators in &self.search.n_estimators {
                    out.push(ForestParams {
                        n_estimators,
                        max_depth: (depth > 0).then_some(depth),
                        min_samples_split,
                        max_features: self.forest.max_features,
                        bootstrap: self.forest.bootstrap,
                        seed: self.seed,
                    });
                }
            }
        }
        Ok(out)
    }
}
