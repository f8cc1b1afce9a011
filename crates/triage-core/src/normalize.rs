//! Joins raw messages with their category strings and expands the categories
//! into one integer column per label.
//!
//! Steps, in order:
//! - inner join on `id` (many-to-many, message order first)
//! - label schema taken from the first joined row
//! - every row decoded; any decode failure aborts the run
//! - exact duplicate rows removed, first occurrence kept
//! - rows with `related == 2` removed
//! - every remaining label value must be 0 or 1

use crate::error::{ParseError, Result, TriageError};
use crate::labels::LabelSchema;
use crate::matrix::LabelMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Label whose value 2 marks a row as unusable.
pub const RELATED_LABEL: &str = "related";

/// Value of [`RELATED_LABEL`] that causes a row to be dropped.
pub const INVALID_RELATED_VALUE: u8 = 2;

/// A raw message row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: i64,
    pub message: String,
    /// Untranslated text, when the source provides it.
    #[serde(default)]
    pub original: Option<String>,
    pub genre: String,
}

/// A raw category row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCategoryString {
    pub id: i64,
    pub categories: String,
}

/// A cleaned record. `labels` is ordered by the owning dataset's schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: i64,
    pub message: String,
    pub original: Option<String>,
    pub genre: String,
    pub labels: Vec<u8>,
}

impl NormalizedRecord {
    /// Value of the label called `name`.
    pub fn label(&self, schema: &LabelSchema, name: &str) -> Option<u8> {
        schema.position(name).map(|i| self.labels[i])
    }

    /// Labels paired with their names, in schema order.
    pub fn labels_by_name<'a>(
        &'a self,
        schema: &'a LabelSchema,
    ) -> impl Iterator<Item = (&'a str, u8)> + 'a {
        schema
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.labels.iter().copied())
    }
}

/// Normalized records sharing one label schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedDataset {
    schema: LabelSchema,
    records: Vec<NormalizedRecord>,
}

impl NormalizedDataset {
    /// Assemble a dataset, checking every record against the schema width.
    pub fn new(schema: LabelSchema, records: Vec<NormalizedRecord>) -> Result<Self> {
        if let Some(bad) = records.iter().find(|r| r.labels.len() != schema.len()) {
            return Err(TriageError::Data(format!(
                "record {} has {} labels, schema has {}",
                bad.id,
                bad.labels.len(),
                schema.len()
            )));
        }
        Ok(Self { schema, records })
    }

    pub fn schema(&self) -> &LabelSchema {
        &self.schema
    }

    pub fn records(&self) -> &[NormalizedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Message texts and the aligned label matrix; id, genre and original
    /// text are not features.
    pub fn training_examples(&self) -> Result<(Vec<String>, LabelMatrix)> {
        let mut labels = LabelMatrix::new(self.schema.len());
        let mut texts = Vec::with_capacity(self.records.len());
        for record in &self.records {
            texts.push(record.message.clone());
            labels.push_row(&record.labels)?;
        }
        Ok((texts, labels))
    }
}

/// Inner join on `id`, ordered by message position then category position.
pub fn join_on_id<'a>(
    messages: &'a [RawMessage],
    categories: &'a [RawCategoryString],
) -> Vec<(&'a RawMessage, &'a RawCategoryString)> {
    let mut by_id: HashMap<i64, Vec<&RawCategoryString>> = HashMap::new();
    for category in categories {
        by_id.entry(category.id).or_default().push(category);
    }

    messages
        .iter()
        .flat_map(|message| {
            by_id
                .get(&message.id)
                .into_iter()
                .flatten()
                .map(move |category| (message, *category))
        })
        .collect()
}

/// Merge and clean the raw tables into a normalized dataset.
pub fn normalize(
    messages: &[RawMessage],
    categories: &[RawCategoryString],
) -> Result<NormalizedDataset> {
    let joined = join_on_id(messages, categories);
    info!(
        messages = messages.len(),
        categories = categories.len(),
        joined = joined.len(),
        "Joined raw tables on id"
    );

    let (first_message, first_category) = joined.first().ok_or_else(|| {
        TriageError::Data("no message id matched a category row".to_string())
    })?;
    let schema = LabelSchema::from_encoded(&first_category.categories).map_err(|source| {
        TriageError::RowParse {
            id: first_message.id,
            source,
        }
    })?;
    debug!(labels = schema.len(), "Derived label schema");

    let mut records = Vec::with_capacity(joined.len());
    for (message, category) in &joined {
        let labels = schema
            .decode_values(&category.categories)
            .map_err(|source| TriageError::RowParse {
                id: message.id,
                source,
            })?;
        records.push(NormalizedRecord {
            id: message.id,
            message: message.message.clone(),
            original: message.original.clone(),
            genre: message.genre.clone(),
            labels,
        });
    }

    let decoded = records.len();
    let mut seen = HashSet::with_capacity(records.len());
    records.retain(|record| seen.insert(record.clone()));
    let duplicates = decoded - records.len();

    let before_filter = records.len();
    if let Some(related) = schema.position(RELATED_LABEL) {
        records.retain(|record| record.labels[related] != INVALID_RELATED_VALUE);
    }
    let invalid_related = before_filter - records.len();

    for record in &records {
        if let Some((label, value)) = record.labels_by_name(&schema).find(|(_, v)| *v > 1) {
            return Err(TriageError::RowParse {
                id: record.id,
                source: ParseError::LabelOutOfRange {
                    label: label.to_string(),
                    value,
                },
            });
        }
    }

    info!(
        records = records.len(),
        duplicates_removed = duplicates,
        invalid_related_removed = invalid_related,
        "Normalized dataset"
    );

    NormalizedDataset::new(schema, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn message(id: i64, text: &str, genre: &str) -> RawMessage {
        RawMessage {
            id,
            message: text.to_string(),
            original: None,
            genre: genre.to_string(),
        }
    }

    fn category(id: i64, encoded: &str) -> RawCategoryString {
        RawCategoryString {
            id,
            categories: encoded.to_string(),
        }
    }

    #[test]
    fn test_single_row_scenario() {
        let dataset = normalize(
            &[message(1, "help", "direct")],
            &[category(1, "related-1;request-0;offer-0")],
        )
        .unwrap();

        assert_eq!(dataset.len(), 1);
        let record = &dataset.records()[0];
        assert_eq!(record.id, 1);
        assert_eq!(record.message, "help");
        assert_eq!(record.genre, "direct");
        let labels: Vec<_> = record.labels_by_name(dataset.schema()).collect();
        assert_eq!(labels, vec![("related", 1), ("request", 0), ("offer", 0)]);
    }

    #[test]
    fn test_related_two_row_is_dropped() {
        let dataset = normalize(
            &[message(1, "a", "direct"), message(2, "b", "news")],
            &[category(1, "related-1;request-0"), category(2, "related-2;request-0")],
        )
        .unwrap();

        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records()[0].id, 1);
    }

    #[test]
    fn test_exact_duplicates_collapse() {
        let dataset = normalize(
            &[message(1, "a", "direct"), message(1, "a", "direct")],
            &[category(1, "related-1;request-0")],
        )
        .unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_same_id_different_text_is_not_a_duplicate() {
        let dataset = normalize(
            &[message(1, "a", "direct"), message(1, "b", "direct")],
            &[category(1, "related-1;request-0")],
        )
        .unwrap();
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_unmatched_ids_are_excluded() {
        let dataset = normalize(
            &[message(1, "a", "direct"), message(3, "c", "social")],
            &[category(1, "related-1;request-0"), category(2, "related-0;request-0")],
        )
        .unwrap();
        let ids: Vec<i64> = dataset.records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_join_is_many_to_many_in_message_order() {
        let messages = [message(2, "b", "news"), message(1, "a", "direct")];
        let categories = [
            category(1, "related-1"),
            category(2, "related-0"),
            category(2, "related-1"),
        ];
        let joined = join_on_id(&messages, &categories);
        let pairs: Vec<(i64, &str)> = joined
            .iter()
            .map(|(m, c)| (m.id, c.categories.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![(2, "related-0"), (2, "related-1"), (1, "related-1")]
        );
    }

    #[test]
    fn test_malformed_row_fails_whole_run() {
        let err = normalize(
            &[message(1, "a", "direct"), message(2, "b", "direct")],
            &[category(1, "related-1;request-0"), category(2, "related-1;request")],
        )
        .unwrap_err();
        assert!(matches!(err, TriageError::RowParse { id: 2, .. }));
    }

    #[test]
    fn test_token_count_mismatch_fails_fast() {
        let err = normalize(
            &[message(1, "a", "direct"), message(2, "b", "direct")],
            &[category(1, "related-1;request-0"), category(2, "related-1")],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TriageError::RowParse {
                id: 2,
                source: ParseError::SchemaMismatch {
                    expected: 2,
                    found: 1
                }
            }
        ));
    }

    #[test]
    fn test_out_of_range_label_fails() {
        let err = normalize(
            &[message(1, "a", "direct")],
            &[category(1, "related-1;request-3")],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TriageError::RowParse {
                source: ParseError::LabelOutOfRange { value: 3, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_empty_join_is_data_error() {
        let err = normalize(&[message(1, "a", "direct")], &[category(9, "related-1")]).unwrap_err();
        assert!(matches!(err, TriageError::Data(_)));
    }

    #[test]
    fn test_training_examples_drop_non_feature_columns() {
        let dataset = normalize(
            &[message(1, "water please", "direct"), message(2, "all fine", "news")],
            &[category(1, "related-1;water-1"), category(2, "related-0;water-0")],
        )
        .unwrap();
        let (texts, labels) = dataset.training_examples().unwrap();
        assert_eq!(texts, vec!["water please", "all fine"]);
        assert_eq!(labels.n_cols(), 2);
        assert_eq!(labels.row(0), &[1, 1]);
        assert_eq!(labels.row(1), &[0, 0]);
    }

    proptest! {
        #[test]
        fn prop_records_come_from_overlapping_ids(
            message_ids in proptest::collection::btree_set(0i64..40, 0..20),
            category_ids in proptest::collection::btree_set(0i64..40, 0..20),
        ) {
            let messages: Vec<_> = message_ids
                .iter()
                .map(|&id| message(id, &format!("message {id}"), "direct"))
                .collect();
            let categories: Vec<_> = category_ids
                .iter()
                .map(|&id| category(id, &format!("related-{};request-0", id % 3)))
                .collect();
            let overlap: BTreeSet<i64> = message_ids.intersection(&category_ids).copied().collect();

            match normalize(&messages, &categories) {
                Ok(dataset) => {
                    prop_assert!(dataset.len() <= overlap.len());
                    for record in dataset.records() {
                        prop_assert!(message_ids.contains(&record.id));
                        prop_assert!(category_ids.contains(&record.id));
                        prop_assert!(record.labels.iter().all(|&v| v <= 1));
                    }
                }
                Err(err) => {
                    prop_assert!(overlap.is_empty());
                    prop_assert!(matches!(err, TriageError::Data(_)));
                }
            }
        }
    }
}
