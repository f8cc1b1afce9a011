//! Text feature extraction: token counts and TF-IDF weighting.
//!
//! [`CountVectorizer`] learns a sorted vocabulary from training texts using
//! [`crate::tokenize::tokenize`]; [`TfidfTransformer`] rescales the counts by
//! smoothed inverse document frequency and L2-normalizes each row.

use crate::error::{Result, TriageError};
use crate::matrix::{SparseMatrix, SparseRow};
use crate::pipeline::{Stage, Transformer};
use crate::tokenize::tokenize;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Bag-of-words counter with a vocabulary learned at fit time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountVectorizer {
    vocabulary: BTreeMap<String, usize>,
}

impl CountVectorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learned term → column mapping. Columns follow sorted term order.
    pub fn vocabulary(&self) -> &BTreeMap<String, usize> {
        &self.vocabulary
    }

    fn learn(&mut self, tokenized: &[Vec<String>]) -> Result<()> {
        let terms: BTreeSet<&str> = tokenized
            .iter()
            .flat_map(|tokens| tokens.iter().map(String::as_str))
            .collect();
        if terms.is_empty() {
            return Err(TriageError::Data(
                "empty vocabulary; training texts contain no tokens".to_string(),
            ));
        }
        self.vocabulary = terms
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term.to_string(), idx))
            .collect();
        debug!(terms = self.vocabulary.len(), "Learned vocabulary");
        Ok(())
    }

    fn count(&self, tokenized: &[Vec<String>]) -> Result<SparseMatrix> {
        let rows = tokenized
            .par_iter()
            .map(|tokens| {
                let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
                for token in tokens {
                    if let Some(&col) = self.vocabulary.get(token) {
                        *counts.entry(col).or_insert(0.0) += 1.0;
                    }
                }
                SparseRow::from_sorted(counts)
            })
            .collect();
        SparseMatrix::from_rows(self.vocabulary.len(), rows)
    }
}

fn tokenize_all(texts: &[String]) -> Vec<Vec<String>> {
    texts.par_iter().map(|t| tokenize(t)).collect()
}

impl Stage for CountVectorizer {
    fn name(&self) -> &'static str {
        "vect"
    }
}

impl Transformer<[String]> for CountVectorizer {
    type Output = SparseMatrix;

    fn fit(&mut self, input: &[String]) -> Result<()> {
        self.learn(&tokenize_all(input))
    }

    fn transform(&self, input: &[String]) -> Result<SparseMatrix> {
        if self.vocabulary.is_empty() {
            return Err(TriageError::Fit("vectorizer is not fitted".to_string()));
        }
        self.count(&tokenize_all(input))
    }

    fn fit_transform(&mut self, input: &[String]) -> Result<SparseMatrix> {
        let tokenized = tokenize_all(input);
        self.learn(&tokenized)?;
        self.count(&tokenized)
    }
}

/// Smoothed inverse-document-frequency weighting with L2 row norm.
///
/// `idf(t) = ln((1 + n) / (1 + df(t))) + 1`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TfidfTransformer {
    idf: Vec<f64>,
}

impl TfidfTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }
}

impl Stage for TfidfTransformer {
    fn name(&self) -> &'static str {
        "tfidf"
    }
}

impl Transformer<SparseMatrix> for TfidfTransformer {
    type Output = SparseMatrix;

    fn fit(&mut self, input: &SparseMatrix) -> Result<()> {
        let mut df = vec![0usize; input.n_cols()];
        for row in input.rows() {
            for &col in row.indices() {
                df[col] += 1;
            }
        }
        let n = input.n_rows() as f64;
        self.idf = df
            .into_iter()
            .map(|d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();
        Ok(())
    }

    fn transform(&self, input: &SparseMatrix) -> Result<SparseMatrix> {
        if input.n_cols() != self.idf.len() {
            return Err(TriageError::Data(format!(
                "tfidf fitted on {} features, got {}",
                self.idf.len(),
                input.n_cols()
            )));
        }
        let mut out = input.clone();
        out.rows_mut().par_iter_mut().for_each(|row| {
            let indices = row.indices().to_vec();
            let values = row.values_mut();
            for (value, col) in values.iter_mut().zip(indices) {
                *value *= self.idf[col];
            }
            let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                values.iter_mut().for_each(|v| *v /= norm);
            }
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_vocabulary_is_sorted() {
        let mut vect = CountVectorizer::new();
        vect.fit(&texts(&["water food", "food shelter"])[..]).unwrap();
        let terms: Vec<(&str, usize)> = vect
            .vocabulary()
            .iter()
            .map(|(t, i)| (t.as_str(), *i))
            .collect();
        assert_eq!(terms, vec![("food", 0), ("shelter", 1), ("water", 2)]);
    }

    #[test]
    fn test_counts_and_unseen_terms() {
        let mut vect = CountVectorizer::new();
        let train = vect.fit_transform(&texts(&["water water food"])[..]).unwrap();
        assert_eq!(train.row(0).get(0), 1.0);
        assert_eq!(train.row(0).get(1), 2.0);

        let test = vect.transform(&texts(&["medicine please"])[..]).unwrap();
        assert_eq!(test.row(0).nnz(), 0);
        assert_eq!(test.n_cols(), 2);
    }

    #[test]
    fn test_empty_vocabulary_is_data_error() {
        let mut vect = CountVectorizer::new();
        let err = vect.fit(&texts(&["", "   "])[..]).unwrap_err();
        assert!(matches!(err, TriageError::Data(_)));
    }

    #[test]
    fn test_idf_smoothing() {
        let mut vect = CountVectorizer::new();
        let counts = vect.fit_transform(&texts(&["water food", "water"])[..]).unwrap();
        let mut tfidf = TfidfTransformer::new();
        tfidf.fit(&counts).unwrap();

        // food: df=1, water: df=2, n=2
        assert!((tfidf.idf()[0] - ((3.0f64 / 2.0).ln() + 1.0)).abs() < 1e-12);
        assert!((tfidf.idf()[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rows_are_unit_length() {
        let mut vect = CountVectorizer::new();
        let counts = vect
            .fit_transform(&texts(&["water food food", "shelter", "water"])[..])
            .unwrap();
        let mut tfidf = TfidfTransformer::new();
        let weighted = tfidf.fit_transform(&counts).unwrap();
        for row in weighted.rows() {
            let norm: f64 = row.values().iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_tfidf_rejects_width_mismatch() {
        let mut tfidf = TfidfTransformer::new();
        tfidf.fit(&SparseMatrix::new(3)).unwrap();
        assert!(tfidf.transform(&SparseMatrix::new(4)).is_err());
    }
}
