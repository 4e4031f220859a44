//! ML prediction engine
//!
//! A fitted predictor is either probabilistic (scores positive-class
//! probabilities) or point-valued. The capability is resolved once when the
//! artifact is loaded, so request handling never inspects the model.

mod features;
mod inference;
mod linear;
mod output;

pub use features::{FeatureLayout, MissingValues};
pub use inference::{OnnxClassifier, OnnxModel, OnnxRegressor};
pub use linear::{LinearKind, LinearModel};
pub use output::{
    batch_table, label_for, single_prediction, Scores, SinglePrediction, DEFAULT_THRESHOLD,
    PRED_COLUMN, PROBA_COLUMN, TOP_K_COLUMN,
};

use crate::config::ServiceConfig;
use crate::error::{ConfigError, InferenceError};
use crate::table::Table;
use std::path::Path;
use tracing::info;

/// Model that scores class probabilities
pub trait ProbabilisticPredictor: Send + Sync {
    /// Positive-class probability per row, in row order
    fn predict_proba(&self, batch: &Table) -> Result<Vec<f64>, InferenceError>;

    /// Features the model was fit against
    fn features(&self) -> &[String];
}

/// Model that produces point predictions
pub trait PointPredictor: Send + Sync {
    /// One prediction per row, in row order
    fn predict(&self, batch: &Table) -> Result<Vec<f64>, InferenceError>;

    /// Features the model was fit against
    fn features(&self) -> &[String];
}

/// A loaded predictor, tagged by capability
pub enum Predictor {
    Probabilistic(Box<dyn ProbabilisticPredictor>),
    Point(Box<dyn PointPredictor>),
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor")
            .field("kind", &self.kind())
            .field("features", &self.features())
            .finish()
    }
}

impl Predictor {
    /// Load the artifact named by `model_path`, picking the format by extension
    pub fn load(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let path = config.model_path.as_path();
        if !path.is_file() {
            return Err(ConfigError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }

        let predictor = match extension(path).as_str() {
            "onnx" => {
                let model = OnnxModel::load(path, config.feature_columns.as_deref())?;
                if model.is_classifier() {
                    Predictor::Probabilistic(Box::new(OnnxClassifier::new(model)))
                } else {
                    Predictor::Point(Box::new(OnnxRegressor::new(model)))
                }
            }
            "json" => {
                let model = LinearModel::load(path)?;
                match model.kind() {
                    LinearKind::Logistic => Predictor::Probabilistic(Box::new(model)),
                    LinearKind::Linear => Predictor::Point(Box::new(model)),
                }
            }
            other => {
                return Err(ConfigError::UnsupportedModelFormat {
                    path: path.to_path_buf(),
                    extension: other.to_string(),
                })
            }
        };

        info!(
            path = %path.display(),
            kind = predictor.kind(),
            features = ?predictor.features(),
            "Model loaded"
        );
        Ok(predictor)
    }

    pub fn probabilistic(model: impl ProbabilisticPredictor + 'static) -> Self {
        Predictor::Probabilistic(Box::new(model))
    }

    pub fn point(model: impl PointPredictor + 'static) -> Self {
        Predictor::Point(Box::new(model))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Predictor::Probabilistic(_) => "probabilistic",
            Predictor::Point(_) => "point",
        }
    }

    pub fn features(&self) -> &[String] {
        match self {
            Predictor::Probabilistic(model) => model.features(),
            Predictor::Point(model) => model.features(),
        }
    }

    /// Score a reconciled batch on whichever branch this model supports
    pub fn score(&self, batch: &Table) -> Result<Scores, InferenceError> {
        let scores = match self {
            Predictor::Probabilistic(model) => Scores::Probabilities(model.predict_proba(batch)?),
            Predictor::Point(model) => Scores::Predictions(model.predict(batch)?),
        };

        if scores.len() != batch.num_rows() {
            return Err(InferenceError::OutputLength {
                expected: batch.num_rows(),
                actual: scores.len(),
            });
        }
        Ok(scores)
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}
