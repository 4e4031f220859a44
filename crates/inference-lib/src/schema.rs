//! Optional JSON Schema validation of incoming records
//!
//! A missing or broken schema file never stops the service: it is logged and
//! validation is switched off.
//!
//! Batch rows come from CSV, where an empty cell is a missing number rather
//! than a JSON `null`. Batches are therefore checked against a copy of the
//! schema in which `"type": "number"` also admits `null`. Numeric keywords
//! such as `minimum` already ignore non-numbers.

use crate::error::{ValidationError, Violation};
use crate::table::{Record, Table};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Compiled input schema, or a no-op when none is configured
pub struct SchemaValidator {
    validator: Option<jsonschema::Validator>,
    /// Same schema with missing numbers allowed, for batch rows
    tabular: Option<jsonschema::Validator>,
    source: Option<PathBuf>,
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("enabled", &self.is_enabled())
            .field("source", &self.source)
            .finish()
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::disabled()
    }
}

impl SchemaValidator {
    /// Validator that accepts every record
    pub fn disabled() -> Self {
        Self {
            validator: None,
            tabular: None,
            source: None,
        }
    }

    /// Compile a schema document
    pub fn from_value(schema: &Value) -> Result<Self, String> {
        let validator = jsonschema::validator_for(schema).map_err(|e| e.to_string())?;

        let mut relaxed = schema.clone();
        allow_missing_numbers(&mut relaxed);
        let tabular = jsonschema::validator_for(&relaxed).map_err(|e| e.to_string())?;

        Ok(Self {
            validator: Some(validator),
            tabular: Some(tabular),
            source: None,
        })
    }

    /// Load a schema file, degrading to [`SchemaValidator::disabled`] when the
    /// file is absent, unreadable, not JSON, or not a valid schema
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No input schema found, validation disabled");
            return Self::disabled();
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str::<Value>(&content).map_err(|e| e.to_string()))
            .and_then(|schema| Self::from_value(&schema));

        match parsed {
            Ok(mut validator) => {
                info!(path = %path.display(), "Input schema loaded");
                validator.source = Some(path.to_path_buf());
                validator
            }
            Err(error) => {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "Cannot load input schema, validation disabled"
                );
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.validator.is_some()
    }

    /// File the schema was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Check one record, reporting every violation found
    pub fn validate(&self, record: &Record) -> Result<(), ValidationError> {
        match &self.validator {
            Some(validator) => check(validator, record),
            None => Ok(()),
        }
    }

    /// Check every row independently; any failure rejects the whole batch,
    /// with violations from all failing rows collected. Null cells count as
    /// missing numbers.
    pub fn validate_batch(&self, table: &Table) -> Result<(), ValidationError> {
        let Some(validator) = &self.tabular else {
            return Ok(());
        };

        let violations: Vec<Violation> = table
            .records()
            .enumerate()
            .filter_map(|(row, record)| check(validator, &record).err().map(|e| e.at_row(row)))
            .flat_map(|e| e.violations)
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations))
        }
    }
}

fn check(validator: &jsonschema::Validator, record: &Record) -> Result<(), ValidationError> {
    let instance = Value::Object(record.clone());
    let violations: Vec<Violation> = validator
        .iter_errors(&instance)
        .map(|error| Violation {
            row: None,
            message: error.to_string(),
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(violations))
    }
}

/// Rewrite every `"type"` that admits `number` to also admit `null`
fn allow_missing_numbers(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            if let Some(ty) = map.get_mut("type") {
                if ty.as_str() == Some("number") {
                    *ty = json!(["number", "null"]);
                } else if let Value::Array(types) = ty {
                    let admits = |name: &str| types.iter().any(|t| t.as_str() == Some(name));
                    if admits("number") && !admits("null") {
                        types.push(Value::from("null"));
                    }
                }
            }
            for (key, child) in map.iter_mut() {
                // Literal values, not subschemas
                if !matches!(key.as_str(), "enum" | "const" | "default" | "examples") {
                    allow_missing_numbers(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(allow_missing_numbers),
        _ => {}
    }
}
