//! Per-label classification metrics for multi-label predictions.
//!
//! Each label is scored as a binary problem with 1 as the positive class.
//! Undefined ratios (no predicted or no actual positives) are reported as 0.

use crate::error::{Result, TriageError};
use crate::matrix::LabelMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Precision, recall, F1 and support of one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of true positives plus false negatives.
    pub support: usize,
}

/// Averaged precision, recall and F1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub labels: Vec<LabelMetrics>,
    pub micro_avg: AverageMetrics,
    pub macro_avg: AverageMetrics,
    /// Fraction of equal cells over the whole matrix.
    pub accuracy: f64,
}

#[derive(Default, Clone, Copy)]
struct Counts {
    tp: usize,
    fp: usize,
    fn_: usize,
}

impl Counts {
    fn support(&self) -> usize {
        self.tp + self.fn_
    }

    fn scores(&self) -> (f64, f64, f64) {
        let precision = ratio(self.tp, self.tp + self.fp);
        let recall = ratio(self.tp, self.tp + self.fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        (precision, recall, f1)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Score `predicted` against `truth`, column `j` named `label_names[j]`.
pub fn evaluate(
    truth: &LabelMatrix,
    predicted: &LabelMatrix,
    label_names: &[String],
) -> Result<EvaluationReport> {
    if truth.n_rows() != predicted.n_rows() || truth.n_cols() != predicted.n_cols() {
        return Err(TriageError::Data(format!(
            "prediction shape {}x{} does not match truth {}x{}",
            predicted.n_rows(),
            predicted.n_cols(),
            truth.n_rows(),
            truth.n_cols()
        )));
    }
    if label_names.len() != truth.n_cols() {
        return Err(TriageError::Data(format!(
            "{} label names for {} columns",
            label_names.len(),
            truth.n_cols()
        )));
    }
    if truth.is_empty() || truth.n_cols() == 0 {
        return Err(TriageError::Data("cannot evaluate an empty matrix".to_string()));
    }

    let mut per_label = vec![Counts::default(); truth.n_cols()];
    let mut equal_cells = 0usize;
    for r in 0..truth.n_rows() {
        for (c, (t, p)) in truth.row(r).iter().zip(predicted.row(r)).enumerate() {
            if t == p {
                equal_cells += 1;
            }
            let counts = &mut per_label[c];
            match (*t == 1, *p == 1) {
                (true, true) => counts.tp += 1,
                (false, true) => counts.fp += 1,
                (true, false) => counts.fn_ += 1,
                (false, false) => {}
            }
        }
    }

    let labels: Vec<LabelMetrics> = per_label
        .iter()
        .zip(label_names)
        .map(|(counts, name)| {
            let (precision, recall, f1) = counts.scores();
            LabelMetrics {
                label: name.clone(),
                precision,
                recall,
                f1,
                support: counts.support(),
            }
        })
        .collect();

    let total = per_label.iter().fold(Counts::default(), |acc, c| Counts {
        tp: acc.tp + c.tp,
        fp: acc.fp + c.fp,
        fn_: acc.fn_ + c.fn_,
    });
    let (precision, recall, f1) = total.scores();
    let micro_avg = AverageMetrics {
        precision,
        recall,
        f1,
        support: total.support(),
    };

    let n = labels.len() as f64;
    let macro_avg = AverageMetrics {
        precision: labels.iter().map(|m| m.precision).sum::<f64>() / n,
        recall: labels.iter().map(|m| m.recall).sum::<f64>() / n,
        f1: labels.iter().map(|m| m.f1).sum::<f64>() / n,
        support: total.support(),
    };

    let accuracy = equal_cells as f64 / (truth.n_rows() * truth.n_cols()) as f64;

    Ok(EvaluationReport {
        labels,
        micro_avg,
        macro_avg,
        accuracy,
    })
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .labels
            .iter()
            .map(|m| m.label.len())
            .chain(["macro avg".len()])
            .max()
            .unwrap_or(0);

        writeln!(
            f,
            "{:>width$} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for m in &self.labels {
            writeln!(
                f,
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                m.label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        for (name, avg) in [("micro avg", &self.micro_avg), ("macro avg", &self.macro_avg)] {
            writeln!(
                f,
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, avg.precision, avg.recall, avg.f1, avg.support
            )?;
        }
        Ok(())
    }
}
