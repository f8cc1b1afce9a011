//! JSON evaluation report artifact.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use triage_core::{EvaluationReport, ForestParams, TrainedModel};

use crate::atomic::write_atomic;
use crate::error::Result;

/// Evaluation results plus the model they describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDocument {
    pub generated_at: DateTime<Utc>,
    pub model_id: String,
    pub best_params: ForestParams,
    pub cv_best_score: f64,
    pub report: EvaluationReport,
}

impl EvaluationDocument {
    pub fn new(model: &TrainedModel, report: EvaluationReport) -> Self {
        Self {
            generated_at: Utc::now(),
            model_id: model.model_id.to_string(),
            best_params: model.best_params().clone(),
            cv_best_score: model.cv_results().best().mean_score,
            report,
        }
    }
}

/// Write the document as pretty JSON.
pub fn write_evaluation_json(path: &Path, document: &EvaluationDocument) -> Result<()> {
    let json = serde_json::to_vec_pretty(document)?;
    write_atomic(path, &json)?;
    info!(path = %path.display(), "Wrote evaluation report");
    Ok(())
}

pub fn read_evaluation_json(path: &Path) -> Result<EvaluationDocument> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
