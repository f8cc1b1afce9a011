//! `train-classifier`: normalized table in, model artifact and evaluation out.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use triage_core::{
    evaluate, train_test_split, EvaluationReport, ModelBuilder, TrainingConfig,
};
use triage_store::{
    save_model, write_evaluation_json, ArtifactInfo, EvaluationDocument, SqliteStore,
    DEFAULT_TABLE,
};

#[derive(Parser, Debug)]
#[command(name = "train-classifier")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and evaluate the multi-label message classifier", long_about = None)]
pub struct TrainArgs {
    /// SQLite database written by process-data
    pub database: PathBuf,

    /// Output path for the model artifact
    pub model: PathBuf,

    /// Table holding the cleaned dataset
    #[arg(long, env = "TRIAGE_TABLE", default_value = DEFAULT_TABLE)]
    pub table: String,

    /// Training configuration (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seed for the split and the forests; overrides the config file
    #[arg(long, env = "TRIAGE_SEED")]
    pub seed: Option<u64>,

    /// Worker threads; overrides the config file
    #[arg(long)]
    pub threads: Option<usize>,

    /// Also write the evaluation as JSON here
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub model_id: String,
    pub report: EvaluationReport,
    pub artifact: ArtifactInfo,
}

/// Config file (or defaults) with command-line overrides applied.
pub fn resolve_config(args: &TrainArgs) -> Result<TrainingConfig> {
    let mut config = match &args.config {
        Some(path) => TrainingConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TrainingConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }
    config.validate().context("Invalid training configuration")?;
    Ok(config)
}

pub fn run(args: &TrainArgs) -> Result<TrainOutcome> {
    let config = resolve_config(args)?;

    if !args.database.exists() {
        bail!("Database {} does not exist", args.database.display());
    }
    info!(database = %args.database.display(), table = %args.table, "Loading data");
    let dataset = SqliteStore::open(&args.database)
        .and_then(|store| store.read_dataset(&args.table))
        .with_context(|| {
            format!(
                "Failed to read table {} from {}",
                args.table,
                args.database.display()
            )
        })?;
    let names = dataset.schema().names().to_vec();
    let (texts, labels) = dataset.training_examples()?;

    let split = train_test_split(texts.len(), config.test_size, config.seed)
        .context("Failed to split dataset")?;
    let pick = |rows: &[usize]| -> Vec<String> { rows.iter().map(|&r| texts[r].clone()).collect() };
    let (train_texts, test_texts) = (pick(&split.train), pick(&split.test));
    let (train_labels, test_labels) = (labels.select_rows(&split.train), labels.select_rows(&split.test));
    info!(
        train = train_texts.len(),
        test = test_texts.len(),
        labels = names.len(),
        "Split dataset"
    );

    info!("Training model");
    let model = ModelBuilder::new(config)
        .fit(&train_texts, &train_labels, &names)
        .context("Failed to train model")?;

    info!("Evaluating model");
    let predicted = model.predict(&test_texts)?;
    let report = evaluate(&test_labels, &predicted, &names)?;

    info!(model = %args.model.display(), "Saving model");
    let artifact = save_model(&args.model, &model)
        .with_context(|| format!("Failed to save model to {}", args.model.display()))?;

    if let Some(path) = &args.report {
        let document = EvaluationDocument::new(&model, report.clone());
        write_evaluation_json(path, &document)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    Ok(TrainOutcome {
        model_id: model.model_id.to_string(),
        report,
        artifact,
    })
}
