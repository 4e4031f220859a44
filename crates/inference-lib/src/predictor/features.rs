//! Feature binding for ML inference
//!
//! Maps a reconciled table onto the exact, ordered feature list a model was
//! fit against. The column *set* must match exactly; the binding then reads
//! values by name so the table's own column order does not matter.

use crate::error::InferenceError;
use crate::table::Table;
use serde_json::Value;
use std::collections::HashSet;

/// How a predictor treats null cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingValues {
    /// Pass nulls as NaN (models with their own imputation)
    AsNan,
    /// Fail the request on any null
    Reject,
}

/// Ordered feature names a model expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureLayout {
    names: Vec<String>,
}

impl FeatureLayout {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
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

    /// Resolve each feature to its column index in `table`, failing when the
    /// column sets differ in either direction
    pub fn bind(&self, table: &Table) -> Result<Vec<usize>, InferenceError> {
        let expected: HashSet<&str> = self.names.iter().map(String::as_str).collect();

        let missing: Vec<String> = self
            .names
            .iter()
            .filter(|name| table.column_index(name).is_none())
            .cloned()
            .collect();
        let unexpected: Vec<String> = table
            .columns()
            .iter()
            .filter(|column| !expected.contains(column.as_str()))
            .cloned()
            .collect();

        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(InferenceError::FeatureMismatch {
                missing,
                unexpected,
            });
        }

        Ok(self
            .names
            .iter()
            .filter_map(|name| table.column_index(name))
            .collect())
    }

    /// Row-major numeric matrix in feature order
    pub fn matrix(&self, table: &Table, missing: MissingValues) -> Result<Vec<Vec<f64>>, InferenceError> {
        let indices = self.bind(table)?;

        table
            .rows()
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                indices
                    .iter()
                    .zip(&self.names)
                    .map(|(&col_idx, name)| numeric(&row[col_idx], row_idx, name, missing))
                    .collect::<Result<Vec<f64>, _>>()
            })
            .collect()
    }
}

/// Coerce one cell to a number: booleans are 0/1 and numeric strings parse
pub(crate) fn numeric(value: &Value, row: usize, column: &str, missing: MissingValues) -> Result<f64, InferenceError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| non_numeric(row, column, value)),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null => match missing {
            MissingValues::AsNan => Ok(f64::NAN),
            MissingValues::Reject => Err(InferenceError::MissingValue {
                row,
                column: column.to_string(),
            }),
        },
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| non_numeric(row, column, value)),
        _ => Err(non_numeric(row, column, value)),
    }
}

fn non_numeric(row: usize, column: &str, value: &Value) -> InferenceError {
    InferenceError::NonNumeric {
        row,
        column: column.to_string(),
        value: value.to_string(),
    }
}
