//! Prediction request pipeline
//!
//! Single-record mode: validate, wrap as a one-row table, reconcile, score,
//! and return `{proba, label}` or `{pred}`.
//!
//! Batch mode: validate every row, reconcile, score, flag the top K rows on
//! the probability branch, and return a table aligned row-for-row with the
//! input. Every stage preserves row order, and a failure at any stage fails
//! the whole request before anything is written.

use crate::config::ServiceConfig;
use crate::error::{InferenceError, PipelineError, ReconciliationError};
use crate::predictor::{batch_table, single_prediction, Predictor, Scores, SinglePrediction};
use crate::reconcile::ColumnReconciler;
use crate::schema::SchemaValidator;
use crate::table::{Record, Table};
use crate::topk::top_k_flags;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Which prediction branch produced a batch result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Probability,
    Value,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Probability => "probability",
            Branch::Value => "value",
        }
    }
}

/// Batch result, positionally aligned with the input rows
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPrediction {
    pub table: Table,
    pub branch: Branch,
    /// Rows flagged by top-K, `None` when flagging did not apply
    pub flagged: Option<usize>,
}

impl BatchPrediction {
    pub fn n_rows(&self) -> usize {
        self.table.num_rows()
    }
}

/// Outcome of a persisted batch prediction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub saved: String,
    pub n_rows: usize,
}

/// Immutable per-process inference context
#[derive(Debug, Clone)]
pub struct PredictionPipeline {
    config: Arc<ServiceConfig>,
    predictor: Arc<Predictor>,
    schema: Arc<SchemaValidator>,
    reconciler: ColumnReconciler,
}

impl PredictionPipeline {
    pub fn new(
        config: Arc<ServiceConfig>,
        predictor: Arc<Predictor>,
        schema: Arc<SchemaValidator>,
    ) -> Self {
        let reconciler = ColumnReconciler::from_config(&config);
        Self {
            config,
            predictor,
            schema,
            reconciler,
        }
    }

    /// Load model and schema for `config`; schema problems only disable validation
    pub fn from_config(config: ServiceConfig) -> Result<Self, crate::error::ConfigError> {
        let predictor = Predictor::load(&config)?;
        let schema = SchemaValidator::load(&config.schema_path);
        Ok(Self::new(
            Arc::new(config),
            Arc::new(predictor),
            Arc::new(schema),
        ))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn schema(&self) -> &SchemaValidator {
        &self.schema
    }

    /// Reconcile and reject tables with nothing left to score
    fn prepare(&self, table: &Table) -> Result<Table, ReconciliationError> {
        let reconciled = self.reconciler.reconcile(table);
        if reconciled.num_columns() == 0 {
            return Err(ReconciliationError::NoFeatures {
                dropped: table.columns().to_vec(),
            });
        }
        Ok(reconciled)
    }

    /// Score one record
    pub fn predict_one(&self, record: &Record) -> Result<SinglePrediction, PipelineError> {
        self.schema.validate(record)?;

        let table = Table::from_records(std::slice::from_ref(record));
        let features = self.prepare(&table)?;
        let scores = self.predictor.score(&features)?;

        let prediction = single_prediction(&scores, self.config.threshold).ok_or(
            InferenceError::OutputLength {
                expected: 1,
                actual: 0,
            },
        )?;
        debug!(prediction = ?prediction, "Single record scored");
        Ok(prediction)
    }

    /// Score a batch; the result has exactly one row per input row
    pub fn predict_batch(&self, table: &Table) -> Result<BatchPrediction, PipelineError> {
        self.schema.validate_batch(table)?;

        let features = self.prepare(table)?;
        let scores = self.predictor.score(&features)?;

        let (branch, flags) = match &scores {
            Scores::Probabilities(probabilities) => {
                (Branch::Probability, top_k_flags(probabilities, self.config.top_k))
            }
            Scores::Predictions(_) => (Branch::Value, None),
        };
        let flagged = flags
            .as_ref()
            .map(|flags| flags.iter().filter(|&&flag| flag == 1).count());

        let result = batch_table(&scores, flags.as_deref());
        debug!(
            rows = result.num_rows(),
            branch = branch.as_str(),
            flagged = ?flagged,
            "Batch scored"
        );

        Ok(BatchPrediction {
            table: result,
            branch,
            flagged,
        })
    }

    /// Score a batch and write the result CSV to `path`
    pub fn predict_batch_to(
        &self,
        table: &Table,
        path: impl AsRef<Path>,
    ) -> Result<(BatchPrediction, BatchSummary), PipelineError> {
        let path = path.as_ref();
        let prediction = self.predict_batch(table)?;
        prediction.table.write_csv_path(path)?;

        let summary = BatchSummary {
            saved: path.display().to_string(),
            n_rows: prediction.n_rows(),
        };
        Ok((prediction, summary))
    }
}
