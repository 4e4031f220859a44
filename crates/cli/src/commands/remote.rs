//! Commands against a running inference server

use anyhow::{Context, Result};
use colored::Colorize;
use inference_lib::{BatchSummary, SinglePrediction};
use std::path::Path;

use crate::client::{ApiClient, HealthStatus, PredictOneRequest};
use crate::output::{describe_prediction, print_info, print_json, print_success, print_warning, OutputFormat};

/// Check server liveness
pub async fn health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: HealthStatus = client.get("health").await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            if result.status == "ok" {
                print_success(&format!("Server is {}", result.status.green()));
            } else {
                print_warning(&format!("Server reported status {}", result.status.yellow()));
            }
        }
    }
    Ok(())
}

/// Parse `--features` as inline JSON, or as a path to a JSON file
pub fn parse_features(features: &str) -> Result<PredictOneRequest> {
    let raw = if Path::new(features).is_file() {
        std::fs::read_to_string(features).with_context(|| format!("Failed to read {}", features))?
    } else {
        features.to_string()
    };

    let value: serde_json::Value = serde_json::from_str(&raw).context("Features must be valid JSON")?;
    match value {
        serde_json::Value::Object(map) => {
            // Accept either a bare record or a full `{"features": {...}}` request
            if map.len() == 1 {
                if let Some(serde_json::Value::Object(inner)) = map.get("features") {
                    return Ok(PredictOneRequest {
                        features: inner.clone(),
                    });
                }
            }
            Ok(PredictOneRequest { features: map })
        }
        _ => anyhow::bail!("Features must be a JSON object"),
    }
}

/// Score one record remotely
pub async fn predict_one(client: &ApiClient, features: &str, format: OutputFormat) -> Result<()> {
    let request = parse_features(features)?;
    let result: SinglePrediction = client.post("predict_one", &request).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_success(&describe_prediction(&result)),
    }
    Ok(())
}

/// Upload a CSV for batch scoring; the server writes the result file
pub async fn predict_csv(client: &ApiClient, file: &Path, format: OutputFormat) -> Result<()> {
    let result: BatchSummary = client.upload("predict_csv", file).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_success(&format!("Scored {} rows", result.n_rows));
            print_info(&format!("Server saved results to {}", result.saved.cyan()));
        }
    }
    Ok(())
}
