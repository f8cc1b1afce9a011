//! Both commands end to end on small fixture tables.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use triage_cli::process::{self, ProcessArgs};
use triage_cli::train::{self, TrainArgs};
use triage_store::{load_model, SqliteStore};

const CONFIG: &str = r#"
test_size = 0.25
seed = 11

[search]
n_estimators = [3, 5]
cv_folds = 3
"#;

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn fixtures(dir: &Path) -> (PathBuf, PathBuf) {
    let mut messages = String::from("id,message,original,genre\n");
    let mut categories = String::from("id,categories\n");
    for id in 0..24 {
        let (text, encoded) = if id % 2 == 0 {
            ("We are trapped and need rescue", "related-1;request-1;search_and_rescue-1")
        } else {
            ("Everything is fine in our town", "related-0;request-0;search_and_rescue-0")
        };
        messages.push_str(&format!("{id},{text},,direct\n"));
        categories.push_str(&format!("{id},{encoded}\n"));
    }
    let messages_path = dir.join("messages.csv");
    let categories_path = dir.join("categories.csv");
    fs::write(&messages_path, messages).unwrap();
    fs::write(&categories_path, categories).unwrap();
    (messages_path, categories_path)
}

fn process_args(dir: &Path, db: &Path) -> ProcessArgs {
    let (messages, categories) = fixtures(dir);
    ProcessArgs::try_parse_from([
        "process-data",
        arg(&messages),
        arg(&categories),
        arg(&db),
        "--table",
        "messages_clean",
    ])
    .unwrap()
}

#[test]
fn process_then_train() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("triage.db");

    let summary = process::run(&process_args(dir.path(), &db)).unwrap();
    assert_eq!(summary.rows, 24);
    assert_eq!(summary.labels, 3);
    assert!(SqliteStore::open(&db).unwrap().table_exists("messages_clean").unwrap());

    let config = dir.path().join("train.toml");
    fs::write(&config, CONFIG).unwrap();
    let model_path = dir.path().join("out").join("classifier.bin");
    let report_path = dir.path().join("eval.json");
    let args = TrainArgs::try_parse_from([
        "train-classifier",
        arg(&db),
        arg(&model_path),
        "--table",
        "messages_clean",
        "--config",
        arg(&config),
        "--report",
        arg(&report_path),
        "--threads",
        "2",
    ])
    .unwrap();

    let outcome = train::run(&args).unwrap();
    assert_eq!(outcome.report.labels.len(), 3);
    assert_eq!(outcome.report.accuracy, 1.0);
    assert!(report_path.exists());

    let model = load_model(&model_path).unwrap();
    assert_eq!(model.model_id.to_string(), outcome.model_id);
    assert_eq!(model.best_params().seed, 11);
    assert_eq!(model.cv_results().candidates.len(), 2);
}

#[test]
fn flags_override_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("train.toml");
    fs::write(&config, CONFIG).unwrap();
    let args = TrainArgs::try_parse_from([
        "train-classifier",
        "db.sqlite",
        "model.bin",
        "--config",
        arg(&config),
        "--seed",
        "99",
    ])
    .unwrap();
    let resolved = train::resolve_config(&args).unwrap();
    assert_eq!(resolved.seed, 99);
    assert_eq!(resolved.test_size, 0.25);
}

#[test]
fn wrong_argument_count_is_usage_error() {
    let err = ProcessArgs::try_parse_from(["process-data", "only-one.csv"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    assert!(TrainArgs::try_parse_from(["train-classifier"]).is_err());
}

#[test]
fn missing_database_fails() {
    let dir = tempfile::tempdir().unwrap();
    let args = TrainArgs::try_parse_from([
        "train-classifier",
        arg(&dir.path().join("absent.db")),
        arg(&dir.path().join("model.bin")),
    ])
    .unwrap();
    assert!(train::run(&args).is_err());
    assert!(!dir.path().join("absent.db").exists());
}

#[test]
fn malformed_categories_fail_processing() {
    let dir = tempfile::tempdir().unwrap();
    let messages = dir.path().join("m.csv");
    let categories = dir.path().join("c.csv");
    fs::write(&messages, "id,message,genre\n1,help,direct\n").unwrap();
    fs::write(&categories, "id,categories\n1,related-x;request\n").unwrap();
    let db = dir.path().join("out.db");
    let args = ProcessArgs::try_parse_from([
        "process-data",
        arg(&messages),
        arg(&categories),
        arg(&db),
    ])
    .unwrap();
    let err = process::run(&args).unwrap_err();
    assert!(format!("{err:#}").contains("normalize"));
}
