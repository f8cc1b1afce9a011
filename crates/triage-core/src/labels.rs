//! Decoding of `name-value;name-value;...` category strings.
//!
//! Every token carries a label name and a value whose last character is a
//! decimal digit, e.g. `related-1`. The label schema is taken from one decoded
//! row and assumed shared by every other row; later rows are only checked for
//! a matching token count.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Separator between tokens in an encoded category string.
pub const TOKEN_DELIMITER: char = ';';

/// Separator between a label name and its value.
pub const VALUE_SEPARATOR: char = '-';

/// Ordered set of label names shared by every record of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelSchema {
    names: Vec<String>,
}

impl LabelSchema {
    /// Build a schema, rejecting duplicate names.
    pub fn new(names: Vec<String>) -> std::result::Result<Self, ParseError> {
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ParseError::DuplicateLabel { name: name.clone() });
            }
        }
        Ok(Self { names })
    }

    /// Derive the schema from one encoded category string.
    pub fn from_encoded(encoded: &str) -> std::result::Result<Self, ParseError> {
        let names = decode_categories(encoded)?
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        Self::new(names)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Column position of `name`, if present.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Decode the values of `encoded` in schema order.
    ///
    /// Names are not compared against the schema; only the token count is.
    pub fn decode_values(&self, encoded: &str) -> std::result::Result<Vec<u8>, ParseError> {
        let tokens = split_tokens(encoded)?;
        if tokens.len() != self.names.len() {
            return Err(ParseError::SchemaMismatch {
                expected: self.names.len(),
                found: tokens.len(),
            });
        }
        tokens
            .into_iter()
            .map(|token| parse_token(token).map(|(_, value)| value))
            .collect()
    }
}

/// Decode an encoded category string into `(name, value)` pairs in order.
pub fn decode_categories(encoded: &str) -> std::result::Result<Vec<(String, u8)>, ParseError> {
    split_tokens(encoded)?
        .into_iter()
        .map(|token| parse_token(token).map(|(name, value)| (name.to_string(), value)))
        .collect()
}

fn split_tokens(encoded: &str) -> std::result::Result<Vec<&str>, ParseError> {
    if encoded.is_empty() {
        return Err(ParseError::EmptyCategories);
    }
    Ok(encoded.split(TOKEN_DELIMITER).collect())
}

fn parse_token(token: &str) -> std::result::Result<(&str, u8), ParseError> {
    let malformed = || ParseError::MalformedToken {
        token: token.to_string(),
    };

    let (name, value) = token.rsplit_once(VALUE_SEPARATOR).ok_or_else(malformed)?;
    if name.is_empty() {
        return Err(malformed());
    }
    let digit = value
        .chars()
        .last()
        .and_then(|c| c.to_digit(10))
        .ok_or_else(malformed)?;

    Ok((name, digit as u8))
}
