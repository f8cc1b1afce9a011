//! End-to-end flow over the core library: normalize raw rows, split, train,
//! evaluate.

use triage_core::{
    evaluate, normalize, train_test_split, LabelMatrix, ModelBuilder, RawCategoryString,
    RawMessage, SearchConfig, TrainingConfig, TriageError,
};

fn raw_tables() -> (Vec<RawMessage>, Vec<RawCategoryString>) {
    let mut messages = Vec::new();
    let mut categories = Vec::new();
    for id in 0..30i64 {
        let (text, encoded) = match id % 3 {
            0 => ("We need water and food", "related-1;request-1;water-1"),
            1 => ("Please send water to the shelter", "related-1;request-1;water-1"),
            _ => ("The weather is calm today", "related-0;request-0;water-0"),
        };
        messages.push(RawMessage {
            id,
            message: text.to_string(),
            original: Some(format!("original {id}")),
            genre: "direct".to_string(),
        });
        categories.push(RawCategoryString {
            id,
            categories: encoded.to_string(),
        });
    }
    // A row the normalizer must drop.
    messages.push(RawMessage {
        id: 99,
        message: "unclear".to_string(),
        original: None,
        genre: "social".to_string(),
    });
    categories.push(RawCategoryString {
        id: 99,
        categories: "related-2;request-0;water-0".to_string(),
    });
    (messages, categories)
}

fn small_config() -> TrainingConfig {
    TrainingConfig {
        search: SearchConfig {
            n_estimators: vec![5, 10],
            cv_folds: 3,
            ..SearchConfig::default()
        },
        ..TrainingConfig::default()
    }
}

#[test]
fn normalized_dataset_feeds_training() {
    let (messages, categories) = raw_tables();
    let dataset = normalize(&messages, &categories).unwrap();
    assert_eq!(dataset.len(), 30);
    assert!(dataset.records().iter().all(|r| r.labels.iter().all(|&v| v <= 1)));

    let (texts, labels) = dataset.training_examples().unwrap();
    let split = train_test_split(texts.len(), 0.2, 42).unwrap();
    assert_eq!(split.test.len(), 6);

    let train_texts: Vec<String> = split.train.iter().map(|&i| texts[i].clone()).collect();
    let test_texts: Vec<String> = split.test.iter().map(|&i| texts[i].clone()).collect();
    let train_labels = labels.select_rows(&split.train);
    let test_labels = labels.select_rows(&split.test);

    let names = dataset.schema().names().to_vec();
    let model = ModelBuilder::new(small_config())
        .fit(&train_texts, &train_labels, &names)
        .unwrap();
    assert_eq!(model.cv_results().candidates.len(), 2);

    let predicted = model.predict(&test_texts).unwrap();
    assert_eq!(predicted.n_rows(), test_labels.n_rows());
    assert_eq!(predicted.n_cols(), 3);

    let report = evaluate(&test_labels, &predicted, &names).unwrap();
    assert_eq!(report.labels.len(), 3);
    assert_eq!(report.accuracy, 1.0);
}

#[test]
fn training_on_zero_examples_is_data_error() {
    let err = ModelBuilder::new(small_config())
        .fit(&[], &LabelMatrix::new(3), &["a", "b", "c"].map(String::from))
        .unwrap_err();
    assert!(matches!(err, TriageError::Data(_)));
}

#[test]
fn fixed_seed_gives_identical_predictions() {
    let (messages, categories) = raw_tables();
    let dataset = normalize(&messages, &categories).unwrap();
    let (texts, labels) = dataset.training_examples().unwrap();
    let names = dataset.schema().names().to_vec();

    let builder = ModelBuilder::new(small_config());
    let a = builder.fit(&texts, &labels, &names).unwrap();
    let b = builder.fit(&texts, &labels, &names).unwrap();
    assert_eq!(a.pipeline(), b.pipeline());
    assert_eq!(a.predict(&texts).unwrap(), b.predict(&texts).unwrap());
}
