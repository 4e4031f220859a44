//! Inference library for tabular and text models
//!
//! This crate provides the core functionality for:
//! - Configuration loading
//! - Optional JSON Schema validation of input records
//! - Column reconciliation against the fitted model's features
//! - Probability or point prediction with ONNX and linear models
//! - Top-K flagging of batch results
//! - Observability (metrics and structured logging)

pub mod config;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod predictor;
pub mod reconcile;
pub mod schema;
pub mod table;
pub mod topk;

pub use config::ServiceConfig;
pub use error::{
    ConfigError, InferenceError, PipelineError, ReconciliationError, TableError, ValidationError,
    Violation,
};
pub use observability::{ServiceMetrics, StructuredLogger};
pub use pipeline::{BatchPrediction, BatchSummary, Branch, PredictionPipeline};
pub use predictor::{Predictor, SinglePrediction};
pub use schema::SchemaValidator;
pub use table::{Record, Table};
