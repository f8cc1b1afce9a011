//! Model building: grid search, refit, and the fitted model it hands back.

use crate::config::TrainingConfig;
use crate::error::{Result, TriageError};
use crate::features::{CountVectorizer, TfidfTransformer};
use crate::forest::{ForestParams, MultiOutputForest};
use crate::matrix::LabelMatrix;
use crate::pipeline::{Chain, Pipeline};
use crate::search::{grid_search, SearchOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Vectorizer followed by TF-IDF weighting.
pub type FeatureStages = Chain<CountVectorizer, TfidfTransformer>;

/// The full text → labels pipeline.
pub type TextPipeline = Pipeline<FeatureStages, MultiOutputForest>;

pub fn feature_stages() -> FeatureStages {
    Chain::new(CountVectorizer::new(), TfidfTransformer::new())
}

/// A fitted pipeline plus what is needed to interpret and audit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
    label_names: Vec<String>,
    params: ForestParams,
    cv_results: SearchOutcome,
    pipeline: TextPipeline,
}

impl TrainedModel {
    /// Predict one label row per text, columns ordered like [`Self::label_names`].
    pub fn predict(&self, texts: &[String]) -> Result<LabelMatrix> {
        self.pipeline.predict(texts)
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Hyperparameters the final pipeline was refit with.
    pub fn best_params(&self) -> &ForestParams {
        &self.params
    }

    pub fn cv_results(&self) -> &SearchOutcome {
        &self.cv_results
    }

    pub fn pipeline(&self) -> &TextPipeline {
        &self.pipeline
    }

    pub fn vocabulary_size(&self) -> usize {
        self.pipeline.features().first().vocabulary().len()
    }
}

/// Searches the configured grid and refits the winner on all given data.
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    config: TrainingConfig,
}

impl ModelBuilder {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit a model on `texts` with row-aligned `labels` named by `label_names`.
    pub fn fit(
        &self,
        texts: &[String],
        labels: &LabelMatrix,
        label_names: &[String],
    ) -> Result<TrainedModel> {
        if texts.is_empty() {
            return Err(TriageError::Data("no training examples".to_string()));
        }
        if labels.n_cols() == 0 {
            return Err(TriageError::Data("label matrix has zero columns".to_string()));
        }
        if texts.len() != labels.n_rows() {
            return Err(TriageError::Data(format!(
                "{} texts but {} label rows",
                texts.len(),
                labels.n_rows()
            )));
        }
        if label_names.len() != labels.n_cols() {
            return Err(TriageError::Data(format!(
                "{} label names for {} label columns",
                label_names.len(),
                labels.n_cols()
            )));
        }
        self.config.validate()?;

        match self.config.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| TriageError::Fit(format!("failed to build worker pool: {e}")))?;
                pool.install(|| self.search_and_refit(texts, labels, label_names))
            }
            None => self.search_and_refit(texts, labels, label_names),
        }
    }

    fn search_and_refit(
        &self,
        texts: &[String],
        labels: &LabelMatrix,
        label_names: &[String],
    ) -> Result<TrainedModel> {
        let start = Instant::now();
        let candidates = self.config.candidates()?;
        info!(
            candidates = candidates.len(),
            folds = self.config.search.cv_folds,
            examples = texts.len(),
            labels = labels.n_cols(),
            "Starting grid search"
        );
        let outcome = grid_search(texts, labels, &candidates, self.config.search.cv_folds)?;
        let params = outcome.best().params.clone();
        info!(
            n_estimators = params.n_estimators,
            max_depth = ?params.max_depth,
            min_samples_split = params.min_samples_split,
            mean_score = outcome.best().mean_score,
            "Selected hyperparameters"
        );

        let mut pipeline = Pipeline::new(feature_stages(), MultiOutputForest::new(params.clone()));
        pipeline.fit(texts, labels)?;
        let model = TrainedModel {
            model_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            label_names: label_names.to_vec(),
            params,
            cv_results: outcome,
            pipeline,
        };
        info!(
            stages = ?model.pipeline.stage_names(),
            vocabulary = model.vocabulary_size(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Refit pipeline on full training data"
        );
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            search: SearchConfig {
                n_estimators: vec![3],
                cv_folds: 2,
                ..SearchConfig::default()
            },
            ..TrainingConfig::default()
        }
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_zero_examples_is_data_error() {
        let builder = ModelBuilder::new(small_config());
        let labels = LabelMatrix::new(2);
        let err = builder.fit(&[], &labels, &names(&["a", "b"])).unwrap_err();
        assert!(matches!(err, TriageError::Data(_)));
    }

    #[test]
    fn test_row_mismatch_is_data_error() {
        let builder = ModelBuilder::new(small_config());
        let labels = LabelMatrix::from_rows(1, &[vec![1]]).unwrap();
        let err = builder
            .fit(&names(&["x", "y"]), &labels, &names(&["a"]))
            .unwrap_err();
        assert!(matches!(err, TriageError::Data(_)));
    }

    #[test]
    fn test_fewer_examples_than_folds_is_data_error() {
        let mut config = small_config();
        config.search.cv_folds = 5;
        let labels = LabelMatrix::from_rows(1, &[vec![1], vec![0]]).unwrap();
        let err = ModelBuilder::new(config)
            .fit(&names(&["water", "fine"]), &labels, &names(&["aid"]))
            .unwrap_err();
        assert!(matches!(err, TriageError::Data(_)));
    }

    #[test]
    fn test_fit_and_predict() {
        let mut texts = Vec::new();
        let mut rows = Vec::new();
        for i in 0..12 {
            if i % 2 == 0 {
                texts.push("we need water".to_string());
                rows.push(vec![1, 1]);
            } else {
                texts.push("weather is nice".to_string());
                rows.push(vec![0, 0]);
            }
        }
        let labels = LabelMatrix::from_rows(2, &rows).unwrap();
        let model = ModelBuilder::new(small_config())
            .fit(&texts, &labels, &names(&["related", "water"]))
            .unwrap();

        assert_eq!(model.label_names(), &names(&["related", "water"])[..]);
        assert_eq!(model.best_params().n_estimators, 3);
        assert_eq!(model.cv_results().candidates.len(), 1);
        assert_eq!(
            model.pipeline().stage_names(),
            vec!["vect", "tfidf", "clf"]
        );
        assert_eq!(model.vocabulary_size(), 6);

        let predicted = model
            .predict(&names(&["we need water", "weather is nice"]))
            .unwrap();
        assert_eq!(predicted.row(0), &[1, 1]);
        assert_eq!(predicted.row(1), &[0, 0]);
    }

    #[test]
    fn test_dedicated_thread_pool() {
        let mut config = small_config();
        config.threads = Some(2);
        let texts = names(&["help", "fine", "help", "fine"]);
        let labels = LabelMatrix::from_rows(1, &[vec![1], vec![0], vec![1], vec![0]]).unwrap();
        let model = ModelBuilder::new(config)
            .fit(&texts, &labels, &names(&["request"]))
            .unwrap();
        assert_eq!(model.predict(&texts).unwrap(), labels);
    }
}
