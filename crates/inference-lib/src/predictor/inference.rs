//! ONNX inference using tract
//!
//! Runs exported tabular models (e.g. scikit-learn pipelines converted with
//! skl2onnx) without a native runtime. Two input conventions are supported:
//!
//! - one `[1, 1]` float input per feature, named after the column
//! - a single `[1, F]` float input, with column order from `feature_columns`
//!
//! A graph with two or more outputs is treated as a classifier whose second
//! output is the `[1, C]` probability matrix; otherwise it is a regressor.

use super::features::{FeatureLayout, MissingValues};
use super::{PointPredictor, ProbabilisticPredictor};
use crate::error::{ConfigError, InferenceError};
use crate::table::Table;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Output index holding class probabilities for classifier graphs
const PROBABILITY_OUTPUT: usize = 1;

/// Column of the probability matrix for the positive class
const POSITIVE_CLASS: usize = 1;

/// Per-row latency above which a warning is logged
const MAX_ROW_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputLayout {
    /// One `[1, 1]` input per feature
    PerColumn,
    /// Single `[1, F]` input
    Matrix,
}

/// Optimized ONNX graph plus its feature binding
pub struct OnnxModel {
    plan: TractModel,
    layout: FeatureLayout,
    input: InputLayout,
    num_outputs: usize,
    path: PathBuf,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("path", &self.path)
            .field("features", &self.layout.names())
            .field("input", &self.input)
            .field("num_outputs", &self.num_outputs)
            .finish()
    }
}

impl OnnxModel {
    /// Load and optimize an ONNX model from disk
    pub fn load(path: &Path, feature_columns: Option<&[String]>) -> Result<Self, ConfigError> {
        let model_load = |reason: String| ConfigError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = std::fs::read(path).map_err(|e| model_load(e.to_string()))?;
        let mut model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(bytes))
            .map_err(|e| model_load(format!("failed to parse ONNX model: {e:#}")))?;

        let input_names: Vec<String> = model
            .input_outlets()
            .map_err(|e| model_load(format!("{e:#}")))?
            .iter()
            .map(|outlet| model.node(outlet.node).name.clone())
            .collect();
        let num_outputs = model
            .output_outlets()
            .map_err(|e| model_load(format!("{e:#}")))?
            .len();

        let (layout, input) = match feature_columns {
            Some(columns) if input_names.len() == 1 => {
                (FeatureLayout::new(columns.to_vec()), InputLayout::Matrix)
            }
            Some(_) => {
                return Err(model_load(format!(
                    "feature_columns is set but the model has {} inputs; it only applies to single-input models",
                    input_names.len()
                )))
            }
            None => (FeatureLayout::new(input_names.clone()), InputLayout::PerColumn),
        };

        if layout.is_empty() || num_outputs == 0 {
            return Err(model_load("model has no inputs or no outputs".to_string()));
        }

        let width = match input {
            InputLayout::Matrix => layout.len(),
            InputLayout::PerColumn => 1,
        };
        for idx in 0..input_names.len() {
            model = model
                .with_input_fact(idx, f32::fact([1, width]).into())
                .map_err(|e| model_load(format!("failed to set input shape: {e:#}")))?;
        }

        let plan = model
            .into_optimized()
            .map_err(|e| model_load(format!("failed to optimize model: {e:#}")))?
            .into_runnable()
            .map_err(|e| model_load(format!("failed to create runnable model: {e:#}")))?;

        debug!(
            path = %path.display(),
            inputs = ?input_names,
            outputs = num_outputs,
            "ONNX model loaded"
        );

        Ok(Self {
            plan,
            layout,
            input,
            num_outputs,
            path: path.to_path_buf(),
        })
    }

    /// Classifier graphs expose a probability output
    pub fn is_classifier(&self) -> bool {
        self.num_outputs > PROBABILITY_OUTPUT
    }

    pub fn features(&self) -> &[String] {
        self.layout.names()
    }

    fn row_inputs(&self, row: &[f64]) -> Result<TVec<TValue>, InferenceError> {
        let shape_err = |e: tract_ndarray::ShapeError| InferenceError::Runtime(e.to_string());
        let values: Vec<f32> = row.iter().map(|&v| v as f32).collect();

        match self.input {
            InputLayout::Matrix => {
                let width = values.len();
                let tensor: Tensor = tract_ndarray::Array2::from_shape_vec((1, width), values)
                    .map_err(shape_err)?
                    .into();
                Ok(tvec!(tensor.into()))
            }
            InputLayout::PerColumn => values
                .into_iter()
                .map(|v| {
                    tract_ndarray::Array2::from_shape_vec((1, 1), vec![v])
                        .map(|array| Tensor::from(array).into())
                        .map_err(shape_err)
                })
                .collect(),
        }
    }

    /// Run every row through the graph and read one value per row from
    /// `output[.., column]`
    fn score(&self, batch: &Table, output: usize, column: usize) -> Result<Vec<f64>, InferenceError> {
        let matrix = self.layout.matrix(batch, MissingValues::AsNan)?;
        let mut scores = Vec::with_capacity(matrix.len());

        for row in &matrix {
            let start = Instant::now();
            let result = self
                .plan
                .run(self.row_inputs(row)?)
                .map_err(|e| InferenceError::Runtime(format!("{e:#}")))?;

            let tensor = result
                .get(output)
                .ok_or_else(|| InferenceError::Runtime(format!("model has no output {}", output)))?;
            let view = tensor
                .to_array_view::<f32>()
                .map_err(|e| InferenceError::Runtime(format!("{e:#}")))?;
            let value = view.iter().nth(column).copied().ok_or_else(|| {
                InferenceError::Runtime(format!(
                    "output {} has {} values, expected at least {}",
                    output,
                    view.len(),
                    column + 1
                ))
            })?;
            scores.push(f64::from(value));

            let elapsed = start.elapsed();
            if elapsed.as_millis() > MAX_ROW_INFERENCE_MS {
                warn!(elapsed_ms = elapsed.as_millis(), "Row inference exceeded {}ms target", MAX_ROW_INFERENCE_MS);
            }
        }

        Ok(scores)
    }
}

/// ONNX classifier exposing positive-class probabilities
#[derive(Debug)]
pub struct OnnxClassifier(OnnxModel);

impl OnnxClassifier {
    pub fn new(model: OnnxModel) -> Self {
        Self(model)
    }
}

impl ProbabilisticPredictor for OnnxClassifier {
    fn predict_proba(&self, batch: &Table) -> Result<Vec<f64>, InferenceError> {
        self.0.score(batch, PROBABILITY_OUTPUT, POSITIVE_CLASS)
    }

    fn features(&self) -> &[String] {
        self.0.features()
    }
}

/// ONNX regressor exposing point predictions
#[derive(Debug)]
pub struct OnnxRegressor(OnnxModel);

impl OnnxRegressor {
    pub fn new(model: OnnxModel) -> Self {
        Self(model)
    }
}

impl PointPredictor for OnnxRegressor {
    fn predict(&self, batch: &Table) -> Result<Vec<f64>, InferenceError> {
        self.0.score(batch, 0, 0)
    }

    fn features(&self) -> &[String] {
        self.0.features()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::predictor::Predictor;
    use prost::Message;
    use tract_onnx::pb;

    const FLOAT: i32 = 1;

    fn float_input(name: &str, width: i64) -> pb::ValueInfoProto {
        let dim = |n| pb::tensor_shape_proto::Dimension {
            value: Some(pb::tensor_shape_proto::dimension::Value::DimValue(n)),
            ..Default::default()
        };
        pb::ValueInfoProto {
            name: name.to_string(),
            r#type: Some(pb::TypeProto {
                value: Some(pb::type_proto::Value::TensorType(pb::type_proto::Tensor {
                    elem_type: FLOAT,
                    shape: Some(pb::TensorShapeProto {
                        dim: vec![dim(1), dim(width)],
                    }),
                })),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn output(name: &str) -> pb::ValueInfoProto {
        pb::ValueInfoProto {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn constant(name: &str, dims: &[i64], values: &[f32]) -> pb::TensorProto {
        pb::TensorProto {
            name: name.to_string(),
            dims: dims.to_vec(),
            data_type: FLOAT,
            float_data: values.to_vec(),
            ..Default::default()
        }
    }

    fn node(op_type: &str, inputs: &[&str], output: &str) -> pb::NodeProto {
        pb::NodeProto {
            op_type: op_type.to_string(),
            name: output.to_string(),
            input: inputs.iter().map(|s| s.to_string()).collect(),
            output: vec![output.to_string()],
            ..Default::default()
        }
    }

    fn write_model(dir: &Path, file: &str, graph: pb::GraphProto) -> PathBuf {
        let model = pb::ModelProto {
            ir_version: 7,
            opset_import: vec![pb::OperatorSetIdProto {
                domain: String::new(),
                version: 13,
            }],
            graph: Some(graph),
            ..Default::default()
        };
        let path = dir.join(file);
        std::fs::write(&path, model.encode_to_vec()).unwrap();
        path
    }

    /// Two `[1, 1]` inputs; outputs the logit and `[1 - p, p]` for `p = sigmoid(x1 - x2)`
    fn classifier_graph() -> pb::GraphProto {
        let mut concat = node("Concat", &["q", "p"], "probabilities");
        concat.attribute.push(pb::AttributeProto {
            name: "axis".to_string(),
            i: 1,
            r#type: pb::attribute_proto::AttributeType::Int as i32,
            ..Default::default()
        });

        pb::GraphProto {
            name: "classifier".to_string(),
            node: vec![
                node("Sub", &["x1", "x2"], "logit"),
                node("Sigmoid", &["logit"], "p"),
                node("Sub", &["one", "p"], "q"),
                concat,
            ],
            initializer: vec![constant("one", &[1], &[1.0])],
            input: vec![float_input("x1", 1), float_input("x2", 1)],
            output: vec![output("logit"), output("probabilities")],
            ..Default::default()
        }
    }

    /// One `[1, 3]` input; outputs `x @ [1, 2, 3] + 0.5`
    fn regressor_graph() -> pb::GraphProto {
        pb::GraphProto {
            name: "regressor".to_string(),
            node: vec![
                node("MatMul", &["input", "coef"], "product"),
                node("Add", &["product", "bias"], "variable"),
            ],
            initializer: vec![
                constant("coef", &[3, 1], &[1.0, 2.0, 3.0]),
                constant("bias", &[1], &[0.5]),
            ],
            input: vec![float_input("input", 3)],
            output: vec![output("variable")],
            ..Default::default()
        }
    }

    fn config_for(model_path: PathBuf, feature_columns: Option<Vec<String>>) -> ServiceConfig {
        ServiceConfig {
            model_path,
            feature_columns,
            ..ServiceConfig::default()
        }
    }

    fn table(csv: &str) -> Table {
        Table::read_csv(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_per_column_classifier_scores_probabilities() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(dir.path(), "clf.onnx", classifier_graph());

        let predictor = Predictor::load(&config_for(path, None)).unwrap();
        assert_eq!(predictor.kind(), "probabilistic");
        assert_eq!(predictor.features(), &["x1", "x2"]);

        let probs = match predictor {
            Predictor::Probabilistic(model) => model.predict_proba(&table("x2,x1\n0,2\n1,1\n")).unwrap(),
            Predictor::Point(_) => unreachable!(),
        };
        let expected = [1.0 / (1.0 + (-2.0f64).exp()), 0.5];
        for (got, want) in probs.iter().zip(expected) {
            assert!((got - want).abs() < 1e-5, "{got} != {want}");
        }
    }

    #[test]
    fn test_matrix_regressor_uses_feature_columns_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(dir.path(), "reg.onnx", regressor_graph());
        let columns = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let predictor = Predictor::load(&config_for(path, Some(columns))).unwrap();
        assert_eq!(predictor.kind(), "point");
        assert_eq!(predictor.features(), &["a", "b", "c"]);

        let preds = match predictor {
            Predictor::Point(model) => model.predict(&table("c,b,a\n1,1,1\n1,0,0\n")).unwrap(),
            Predictor::Probabilistic(_) => unreachable!(),
        };
        assert!((preds[0] - 6.5).abs() < 1e-5);
        assert!((preds[1] - 3.5).abs() < 1e-5);
    }

    #[test]
    fn test_feature_columns_rejected_for_multi_input_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(dir.path(), "clf.onnx", classifier_graph());

        let err = OnnxModel::load(&path, Some(&["x1".to_string(), "x2".to_string()])).unwrap_err();
        assert!(matches!(err, ConfigError::ModelLoad { ref reason, .. } if reason.contains("2 inputs")));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = OnnxModel::load(Path::new("/nonexistent/model.onnx"), None).unwrap_err();
        assert!(matches!(err, ConfigError::ModelLoad { .. }));
    }

    #[test]
    fn test_garbage_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"definitely not protobuf").unwrap();

        let err = OnnxModel::load(&path, None).unwrap_err();
        assert!(err.to_string().contains("model.onnx"));
    }
}
