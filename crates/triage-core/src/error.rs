//! Error taxonomy for normalization and training.

/// Errors produced while decoding category strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("category string is empty")]
    EmptyCategories,

    #[error("malformed category token: {token:?}")]
    MalformedToken { token: String },

    #[error("duplicate label name in category string: {name}")]
    DuplicateLabel { name: String },

    #[error("expected {expected} category tokens, found {found}")]
    SchemaMismatch { expected: usize, found: usize },

    #[error("label {label} has value {value}, expected 0 or 1")]
    LabelOutOfRange { label: String, value: u8 },
}

/// Errors surfaced by the core pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("parse error in row {id}: {source}")]
    RowParse {
        id: i64,
        #[source]
        source: ParseError,
    },

    #[error("data error: {0}")]
    Data(String),

    #[error("fit error: {0}")]
    Fit(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TriageError {
    /// Whether this error came from decoding category data.
    pub fn is_parse(&self) -> bool {
        matches!(self, TriageError::Parse(_) | TriageError::RowParse { .. })
    }
}

impl From<toml::de::Error> for TriageError {
    fn from(err: toml::de::Error) -> Self {
        TriageError::Config(err.to_string())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, TriageError>;
