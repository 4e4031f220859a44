//! Linear and logistic models stored as JSON
//!
//! A small, dependency-free artifact format for models that are a weighted sum
//! of features:
//!
//! ```json
//! {"kind": "logistic", "features": ["x"], "weights": [0.8], "intercept": -4.2}
//! ```
//!
//! A feature listed under `vocabulary` is a text feature. Its value is the
//! bag-of-words score of the cell: the sum of the token weights over its
//! lowercased alphanumeric tokens, repeats included. Unknown tokens score 0.
//!
//! ```json
//! {"kind": "logistic", "features": ["review"], "weights": [1.0],
//!  "vocabulary": {"review": {"great": 1.5, "awful": -2.0}}}
//! ```

use super::features::{numeric, FeatureLayout, MissingValues};
use super::{PointPredictor, ProbabilisticPredictor};
use crate::error::{ConfigError, InferenceError};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Token weights for one text feature
pub type Vocabulary = HashMap<String, f64>;

/// Link applied to the linear score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinearKind {
    /// Identity link, point predictions
    Linear,
    /// Sigmoid link, positive-class probabilities
    Logistic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinearDocument {
    kind: LinearKind,
    features: Vec<String>,
    weights: Vec<f64>,
    #[serde(default)]
    intercept: f64,
    #[serde(default)]
    vocabulary: BTreeMap<String, Vocabulary>,
}

/// Fitted linear model
#[derive(Debug, Clone)]
pub struct LinearModel {
    kind: LinearKind,
    layout: FeatureLayout,
    weights: Vec<f64>,
    intercept: f64,
    /// Per feature, in layout order; `Some` marks a text feature
    vocabularies: Vec<Option<Vocabulary>>,
}

impl LinearModel {
    pub fn new(
        kind: LinearKind,
        features: Vec<String>,
        weights: Vec<f64>,
        intercept: f64,
    ) -> Result<Self, String> {
        if features.is_empty() {
            return Err("model has no features".to_string());
        }
        if features.len() != weights.len() {
            return Err(format!(
                "{} features but {} weights",
                features.len(),
                weights.len()
            ));
        }
        if !intercept.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err("weights and intercept must be finite".to_string());
        }

        let vocabularies = vec![None; features.len()];
        Ok(Self {
            kind,
            layout: FeatureLayout::new(features),
            weights,
            intercept,
            vocabularies,
        })
    }

    /// Turn `feature` into a text feature scored with `vocabulary`
    pub fn with_vocabulary(mut self, feature: &str, vocabulary: Vocabulary) -> Result<Self, String> {
        let idx = self
            .layout
            .names()
            .iter()
            .position(|name| name == feature)
            .ok_or_else(|| format!("vocabulary given for unknown feature {feature:?}"))?;
        if vocabulary.values().any(|w| !w.is_finite()) {
            return Err(format!("vocabulary for {feature:?} has non-finite weights"));
        }

        self.vocabularies[idx] = Some(vocabulary);
        Ok(self)
    }

    /// Parse a JSON model document
    pub fn from_json(json: &str) -> Result<Self, String> {
        let doc: LinearDocument = serde_json::from_str(json).map_err(|e| e.to_string())?;
        doc.vocabulary.into_iter().try_fold(
            Self::new(doc.kind, doc.features, doc.weights, doc.intercept)?,
            |model, (feature, vocabulary)| model.with_vocabulary(&feature, vocabulary),
        )
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let model_load = |reason: String| ConfigError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };
        let json = std::fs::read_to_string(path).map_err(|e| model_load(e.to_string()))?;
        Self::from_json(&json).map_err(model_load)
    }

    pub fn kind(&self) -> LinearKind {
        self.kind
    }

    /// Weighted sum per row, in row order
    fn decision_function(&self, batch: &Table) -> Result<Vec<f64>, InferenceError> {
        let indices = self.layout.bind(batch)?;

        batch
            .rows()
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                indices
                    .iter()
                    .zip(self.layout.names())
                    .zip(self.weights.iter().zip(&self.vocabularies))
                    .try_fold(self.intercept, |acc, ((&col_idx, name), (weight, vocabulary))| {
                        let cell = &row[col_idx];
                        let x = match vocabulary {
                            Some(vocabulary) => text_score(cell, vocabulary, row_idx, name)?,
                            None => numeric(cell, row_idx, name, MissingValues::Reject)?,
                        };
                        Ok::<_, InferenceError>(acc + x * weight)
                    })
            })
            .collect()
    }
}

/// Bag-of-words score of one text cell
fn text_score(cell: &Value, vocabulary: &Vocabulary, row: usize, column: &str) -> Result<f64, InferenceError> {
    let text = match cell {
        Value::String(s) => s.clone(),
        Value::Null => {
            return Err(InferenceError::MissingValue {
                row,
                column: column.to_string(),
            })
        }
        other => other.to_string(),
    };

    Ok(tokens(&text)
        .filter_map(|token| vocabulary.get(&token))
        .sum())
}

/// Lowercased alphanumeric tokens
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl PointPredictor for LinearModel {
    fn predict(&self, batch: &Table) -> Result<Vec<f64>, InferenceError> {
        let scores = self.decision_function(batch)?;
        Ok(match self.kind {
            LinearKind::Linear => scores,
            LinearKind::Logistic => scores.into_iter().map(|z| if z >= 0.0 { 1.0 } else { 0.0 }).collect(),
        })
    }

    fn features(&self) -> &[String] {
        self.layout.names()
    }
}

impl ProbabilisticPredictor for LinearModel {
    fn predict_proba(&self, batch: &Table) -> Result<Vec<f64>, InferenceError> {
        Ok(self
            .decision_function(batch)?
            .into_iter()
            .map(sigmoid)
            .collect())
    }

    fn features(&self) -> &[String] {
        self.layout.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> Table {
        Table::read_csv(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_linear_predictions() {
        let model = LinearModel::from_json(
            r#"{"kind": "linear", "features": ["area", "rooms"], "weights": [1000.0, 5000.0], "intercept": 20000.0}"#,
        )
        .unwrap();

        let preds = PointPredictor::predict(&model, &table("rooms,area\n2,50\n3,80\n")).unwrap();
        assert_eq!(preds, vec![80000.0, 115000.0]);
    }

    #[test]
    fn test_logistic_probabilities() {
        let model = LinearModel::new(LinearKind::Logistic, vec!["x".into()], vec![1.0], 0.0).unwrap();
        let probs = model.predict_proba(&table("x\n0\n100\n-100\n")).unwrap();

        assert_eq!(probs[0], 0.5);
        assert!(probs[1] > 0.999);
        assert!(probs[2] < 0.001);
    }

    #[test]
    fn test_rejects_inconsistent_document() {
        assert!(LinearModel::from_json(r#"{"kind": "linear", "features": ["a"], "weights": []}"#).is_err());
        assert!(LinearModel::from_json(r#"{"kind": "linear", "features": [], "weights": []}"#).is_err());
        assert!(LinearModel::from_json(r#"{"kind": "tree", "features": ["a"], "weights": [1]}"#).is_err());
    }

    #[test]
    fn test_feature_mismatch_is_inference_error() {
        let model = LinearModel::new(LinearKind::Linear, vec!["x".into()], vec![1.0], 0.0).unwrap();
        let err = PointPredictor::predict(&model, &table("x,y\n1,2\n")).unwrap_err();
        assert!(matches!(err, InferenceError::FeatureMismatch { .. }));
    }

    #[test]
    fn test_missing_value_rejected() {
        let model = LinearModel::new(LinearKind::Linear, vec!["x".into(), "z".into()], vec![1.0, 1.0], 0.0).unwrap();
        let err = PointPredictor::predict(&model, &table("x,z\n1,\n")).unwrap_err();
        assert!(matches!(err, InferenceError::MissingValue { row: 0, .. }));
    }

    #[test]
    fn test_text_feature_scores_tokens() {
        let model = LinearModel::from_json(
            r#"{"kind": "linear", "features": ["review", "stars"], "weights": [1.0, 0.5],
                "vocabulary": {"review": {"great": 2.0, "awful": -3.0}}}"#,
        )
        .unwrap();

        let batch = table("stars,review\n4,Great film. GREAT cast!\n2,awful\n0,no opinion\n");
        let preds = PointPredictor::predict(&model, &batch).unwrap();
        assert_eq!(preds, vec![6.0, -2.0, 0.0]);
    }

    #[test]
    fn test_text_feature_missing_value_rejected() {
        let model = LinearModel::new(LinearKind::Linear, vec!["review".into()], vec![1.0], 0.0)
            .unwrap()
            .with_vocabulary("review", Vocabulary::from([("good".to_string(), 1.0)]))
            .unwrap();

        let mut batch = table("review,id\n,1\n");
        batch.drop_columns(&["id"]);
        let err = PointPredictor::predict(&model, &batch).unwrap_err();
        assert!(matches!(err, InferenceError::MissingValue { row: 0, .. }));
    }

    #[test]
    fn test_vocabulary_for_unknown_feature_rejected() {
        let err = LinearModel::from_json(
            r#"{"kind": "logistic", "features": ["x"], "weights": [1.0], "vocabulary": {"text": {"a": 1.0}}}"#,
        )
        .unwrap_err();
        assert!(err.contains("text"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, r#"{"kind": "logistic", "features": ["x"], "weights": [2.0]}"#).unwrap();

        let model = LinearModel::load(&path).unwrap();
        assert_eq!(model.kind(), LinearKind::Logistic);
        assert_eq!(ProbabilisticPredictor::features(&model), &["x"]);
    }
}
