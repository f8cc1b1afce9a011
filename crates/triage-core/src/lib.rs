//! Triage core library
//!
//! Decodes disaster-response category strings, normalizes the raw message and
//! category tables into a multi-label dataset, and trains a TF-IDF + random
//! forest classifier over it with a cross-validated grid search.

pub mod config;
pub mod error;
pub mod eval;
pub mod features;
pub mod forest;
pub mod labels;
pub mod matrix;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod search;
pub mod split;
pub mod telemetry;
pub mod tokenize;

pub use config::{ForestConfig, SearchConfig, TrainingConfig};
pub use error::{ParseError, Result, TriageError};
pub use eval::{evaluate, AverageMetrics, EvaluationReport, LabelMetrics};
pub use features::{CountVectorizer, TfidfTransformer};
pub use forest::{ForestParams, MaxFeatures, MultiOutputForest, RandomForest};
pub use labels::{decode_categories, LabelSchema};
pub use matrix::{LabelMatrix, SparseMatrix, SparseRow};
pub use model::{feature_stages, FeatureStages, ModelBuilder, TextPipeline, TrainedModel};
pub use normalize::{
    join_on_id, normalize, NormalizedDataset, NormalizedRecord, RawCategoryString, RawMessage,
};
pub use pipeline::{Chain, Estimator, Pipeline, Stage, Transformer};
pub use search::{grid_search, CandidateScore, KFold, SearchOutcome};
pub use split::{train_test_split, SplitIndices};
pub use telemetry::{init_tracing, level_for};
pub use tokenize::tokenize;
