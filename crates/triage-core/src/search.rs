//! Cross-validated grid search over forest hyperparameters.
//!
//! Every candidate is scored on the same contiguous K folds. Feature stages
//! are refit per fold on that fold's training rows only; the fitted features
//! are shared by all candidates since the stages do not depend on forest
//! parameters. `(candidate, fold)` pairs are scored in parallel.

use crate::error::{Result, TriageError};
use crate::forest::{ForestParams, MultiOutputForest};
use crate::matrix::{LabelMatrix, SparseMatrix};
use crate::model::feature_stages;
use crate::pipeline::{Estimator, Transformer};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Train/test row indices for one fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Unshuffled K-fold splitter. The first `n % k` folds get one extra row.
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<Fold>> {
        if self.n_splits < 2 {
            return Err(TriageError::Config(format!(
                "cross-validation needs at least 2 folds, got {}",
                self.n_splits
            )));
        }
        if n_samples < self.n_splits {
            return Err(TriageError::Data(format!(
                "{} examples cannot fill {} folds",
                n_samples, self.n_splits
            )));
        }

        let fold_size = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;
        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for i in 0..self.n_splits {
            let end = start + fold_size + usize::from(i < remainder);
            folds.push(Fold {
                train: (0..start).chain(end..n_samples).collect(),
                test: (start..end).collect(),
            });
            start = end;
        }
        Ok(folds)
    }
}

/// Fraction of rows whose every label matches.
pub fn subset_accuracy(truth: &LabelMatrix, predicted: &LabelMatrix) -> Result<f64> {
    if truth.n_rows() != predicted.n_rows() || truth.n_cols() != predicted.n_cols() {
        return Err(TriageError::Data(format!(
            "cannot score {}x{} predictions against {}x{} truth",
            predicted.n_rows(),
            predicted.n_cols(),
            truth.n_rows(),
            truth.n_cols()
        )));
    }
    if truth.is_empty() {
        return Err(TriageError::Data("cannot score zero rows".to_string()));
    }
    let exact = (0..truth.n_rows())
        .filter(|&r| truth.row(r) == predicted.row(r))
        .count();
    Ok(exact as f64 / truth.n_rows() as f64)
}

/// Cross-validation result of one grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ForestParams,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
}

impl CandidateScore {
    fn new(params: ForestParams, fold_scores: Vec<f64>) -> Self {
        let n = fold_scores.len() as f64;
        let mean_score = fold_scores.iter().sum::<f64>() / n;
        let std_score =
            (fold_scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n).sqrt();
        Self {
            params,
            fold_scores,
            mean_score,
            std_score,
        }
    }
}

/// All candidate scores plus the winner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub candidates: Vec<CandidateScore>,
    pub best_index: usize,
}

impl SearchOutcome {
    pub fn best(&self) -> &CandidateScore {
        &self.candidates[self.best_index]
    }
}

struct FoldData {
    train_features: SparseMatrix,
    train_labels: LabelMatrix,
    test_features: SparseMatrix,
    test_labels: LabelMatrix,
}

fn select_texts(texts: &[String], rows: &[usize]) -> Vec<String> {
    rows.iter().map(|&r| texts[r].clone()).collect()
}

fn prepare_fold(texts: &[String], labels: &LabelMatrix, fold: &Fold) -> Result<FoldData> {
    let mut stages = feature_stages();
    let train_features = stages.fit_transform(&select_texts(texts, &fold.train)[..])?;
    let test_features = stages.transform(&select_texts(texts, &fold.test)[..])?;
    debug!(
        train = train_features.n_rows(),
        test = test_features.n_rows(),
        nnz = train_features.nnz(),
        "Prepared fold features"
    );
    Ok(FoldData {
        train_features,
        train_labels: labels.select_rows(&fold.train),
        test_features,
        test_labels: labels.select_rows(&fold.test),
    })
}

/// Score every candidate with `cv_folds`-fold cross-validation and pick the
/// best mean. Ties go to the earlier candidate.
pub fn grid_search(
    texts: &[String],
    labels: &LabelMatrix,
    candidates: &[ForestParams],
    cv_folds: usize,
) -> Result<SearchOutcome> {
    if candidates.is_empty() {
        return Err(TriageError::Fit("hyperparameter grid is empty".to_string()));
    }
    if texts.len() != labels.n_rows() {
        return Err(TriageError::Data(format!(
            "{} texts but {} label rows",
            texts.len(),
            labels.n_rows()
        )));
    }

    let folds = KFold::new(cv_folds).split(texts.len())?;
    let fold_data = folds
        .par_iter()
        .map(|fold| prepare_fold(texts, labels, fold))
        .collect::<Result<Vec<_>>>()?;
    debug!(folds = fold_data.len(), "Prepared cross-validation folds");

    let pairs: Vec<(usize, usize)> = (0..candidates.len())
        .flat_map(|c| (0..fold_data.len()).map(move |f| (c, f)))
        .collect();
    let scores = pairs
        .into_par_iter()
        .map(|(c, f)| {
            let data = &fold_data[f];
            let mut clf = MultiOutputForest::new(candidates[c].clone());
            clf.fit(&data.train_features, &data.train_labels)?;
            let predicted = clf.predict(&data.test_features)?;
            subset_accuracy(&data.test_labels, &predicted)
        })
        .collect::<Result<Vec<f64>>>()?;

    let results: Vec<CandidateScore> = scores
        .chunks(fold_data.len())
        .zip(candidates)
        .map(|(fold_scores, params)| CandidateScore::new(params.clone(), fold_scores.to_vec()))
        .collect();

    let mut best_index = 0;
    for (idx, result) in results.iter().enumerate() {
        info!(
            candidate = idx,
            n_estimators = result.params.n_estimators,
            max_depth = ?result.params.max_depth,
            min_samples_split = result.params.min_samples_split,
            mean_score = result.mean_score,
            std_score = result.std_score,
            "Scored candidate"
        );
        if result.mean_score > results[best_index].mean_score {
            best_index = idx;
        }
    }

    Ok(SearchOutcome {
        candidates: results,
        best_index,
    })
}
