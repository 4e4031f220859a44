//! Prediction output shaping
//!
//! Turns raw model scores into the response objects and result tables
//! returned by the pipeline.

use crate::table::Table;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Column holding positive-class probabilities in batch output
pub const PROBA_COLUMN: &str = "proba";

/// Column holding point predictions in batch output
pub const PRED_COLUMN: &str = "pred";

/// Column holding top-K membership flags in batch output
pub const TOP_K_COLUMN: &str = "top_k_flag";

/// Default decision threshold
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Raw per-row model output, tagged by the branch that produced it
#[derive(Debug, Clone, PartialEq)]
pub enum Scores {
    /// Positive-class probabilities
    Probabilities(Vec<f64>),
    /// Point predictions
    Predictions(Vec<f64>),
}

impl Scores {
    pub fn len(&self) -> usize {
        match self {
            Scores::Probabilities(values) | Scores::Predictions(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of scoring a single record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SinglePrediction {
    Probability { proba: f64, label: u8 },
    Value { pred: f64 },
}

/// Binary label for a probability: 1 at or above the threshold
pub fn label_for(probability: f64, threshold: f64) -> u8 {
    u8::from(probability >= threshold)
}

/// Build the single-record response from a one-row score vector
pub fn single_prediction(scores: &Scores, threshold: f64) -> Option<SinglePrediction> {
    match scores {
        Scores::Probabilities(values) => values.first().map(|&proba| SinglePrediction::Probability {
            proba,
            label: label_for(proba, threshold),
        }),
        Scores::Predictions(values) => values.first().map(|&pred| SinglePrediction::Value { pred }),
    }
}

/// Build the batch result table: `proba[, top_k_flag]` or `pred`
pub fn batch_table(scores: &Scores, flags: Option<&[u8]>) -> Table {
    let (column, values) = match scores {
        Scores::Probabilities(values) => (PROBA_COLUMN, values),
        Scores::Predictions(values) => (PRED_COLUMN, values),
    };

    let mut columns = vec![column.to_string()];
    if flags.is_some() {
        columns.push(TOP_K_COLUMN.to_string());
    }

    let rows = values.iter().enumerate().map(|(idx, &value)| {
        let mut row = vec![number(value)];
        if let Some(flags) = flags {
            row.push(Value::from(flags.get(idx).copied().unwrap_or(0)));
        }
        row
    });

    Table::with_rows(columns, rows.collect())
}

/// JSON number for a score; non-finite values become null
fn number(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}
