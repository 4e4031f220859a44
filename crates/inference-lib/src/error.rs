//! Error taxonomy for the inference pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Configuration or model artifact problems detected at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration source could not be read or deserialized
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A configuration value is outside its allowed range
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// The model artifact does not exist
    #[error("model artifact not found: {path}")]
    ModelNotFound { path: PathBuf },

    /// The model artifact exists but could not be loaded
    #[error("failed to load model artifact {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// The artifact extension does not map to a known predictor format
    #[error("unsupported model format '{extension}' for {path} (expected .onnx or .json)")]
    UnsupportedModelFormat { path: PathBuf, extension: String },
}

/// A single schema violation, tied to the offending row in batch mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Row index within the batch, `None` for single-record requests
    pub row: Option<usize>,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.row {
            Some(row) => write!(f, "row {}: {}", row, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Record(s) failed the input schema
#[derive(Debug, Clone, Error)]
#[error("input failed schema validation: {}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Attach a batch row index to every violation
    pub fn at_row(mut self, row: usize) -> Self {
        for violation in &mut self.violations {
            violation.row = Some(row);
        }
        self
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Nothing usable was left to feed the predictor
#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("no feature columns remain after dropping {dropped:?}")]
    NoFeatures { dropped: Vec<String> },
}

/// The predictor rejected the reconciled batch
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Column set differs from what the model was fit against
    #[error("feature mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    FeatureMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// A numeric feature received a value that cannot be converted
    #[error("row {row}: column '{column}' is not numeric ({value})")]
    NonNumeric {
        row: usize,
        column: String,
        value: String,
    },

    /// A feature was null and the model has no imputation
    #[error("row {row}: column '{column}' is missing a value")]
    MissingValue { row: usize, column: String },

    /// Model returned a different number of scores than rows supplied
    #[error("model returned {actual} scores for {expected} rows")]
    OutputLength { expected: usize, actual: usize },

    /// Failure inside the model runtime
    #[error("model runtime error: {0}")]
    Runtime(String),
}

/// Malformed tabular input or output I/O failure
#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row} has {actual} fields, header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Any failure of a single prediction request
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Table(#[from] TableError),
}

impl PipelineError {
    /// Short machine-readable kind, used for metrics labels and API bodies
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Reconciliation(_) => "reconciliation",
            PipelineError::Inference(_) => "inference",
            PipelineError::Table(_) => "table",
        }
    }
}
