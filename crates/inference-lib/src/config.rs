//! Service configuration
//!
//! Settings are read once at startup from a config file (YAML, TOML or JSON,
//! picked by extension) layered with `INFERENCE_*` environment overrides, then
//! shared read-only for the lifetime of the process.

use crate::error::ConfigError;
use crate::predictor::DEFAULT_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Config file used when `CONFIG_PATH` is unset
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Prefix for environment overrides, e.g. `INFERENCE_TOP_K=5`
pub const ENV_PREFIX: &str = "INFERENCE";

/// Inference service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Fitted predictor artifact (`.onnx` or `.json`)
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Target column, dropped from inputs when present
    #[serde(default)]
    pub target_col: Option<String>,

    /// Columns always dropped before scoring
    #[serde(default)]
    pub drop_cols: Vec<String>,

    /// Feature name for single-text-input models
    #[serde(default)]
    pub text_col: Option<String>,

    /// Decision threshold for the probability branch
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Number of rows to flag per batch, 0 disables flagging
    #[serde(default)]
    pub top_k: usize,

    /// Human-readable service name
    #[serde(default = "default_title")]
    pub title: String,

    /// Optional JSON Schema for incoming records
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,

    /// Where the HTTP batch endpoint writes its result table
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Column order for ONNX models taking a single `[1, F]` input
    #[serde(default)]
    pub feature_columns: Option<Vec<String>>,

    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model/model.onnx")
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_title() -> String {
    "ML Service".to_string()
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("schemas/input_schema.json")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("predictions.csv")
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            target_col: None,
            drop_cols: Vec::new(),
            text_col: None,
            threshold: default_threshold(),
            top_k: 0,
            title: default_title(),
            schema_path: default_schema_path(),
            output_path: default_output_path(),
            feature_columns: None,
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a file plus environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path.as_ref(), Self::environment())
    }

    /// `INFERENCE_*` overrides; list fields take comma-separated values
    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("drop_cols")
            .with_list_parse_key("feature_columns")
    }

    fn load_with_env(path: &Path, env: config::Environment) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::InvalidValue {
                field: "config_path",
                reason: format!("config file {} does not exist", path.display()),
            });
        }

        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(env)
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        let loaded = loaded.normalized();
        loaded.validate()?;
        Ok(loaded)
    }

    /// Load from the path in `CONFIG_PATH`, falling back to `config.yaml`
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    /// Treat empty column names as unset
    fn normalized(mut self) -> Self {
        self.target_col = self.target_col.filter(|c| !c.is_empty());
        self.text_col = self.text_col.filter(|c| !c.is_empty());
        self.drop_cols.retain(|c| !c.is_empty());
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidValue {
                field: "threshold",
                reason: format!("{} is not in [0, 1]", self.threshold),
            });
        }

        if let Some(columns) = &self.feature_columns {
            if columns.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "feature_columns",
                    reason: "must list at least one column when set".to_string(),
                });
            }
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "port",
                reason: "must be between 1 and 65535".to_string(),
            });
        }

        Ok(())
    }

    /// Address string for the HTTP listener
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}
