//! Local batch prediction without a running server

use anyhow::{Context, Result};
use inference_lib::{PredictionPipeline, ServiceConfig, Table};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;
use tracing::debug;

use crate::output::{print_json, print_table, print_warning, OutputFormat};

/// Summary row for a finished batch
#[derive(Tabled, Serialize)]
struct BatchRow {
    #[tabled(rename = "Rows")]
    rows: usize,
    #[tabled(rename = "Branch")]
    branch: String,
    #[tabled(rename = "Flagged", display_with = "display_flagged")]
    flagged: Option<usize>,
    #[tabled(rename = "Saved")]
    saved: String,
}

fn display_flagged(flagged: &Option<usize>) -> String {
    flagged.map_or_else(|| "-".to_string(), |n| n.to_string())
}

/// Run the batch pipeline over `input` and write predictions to `output`
pub fn run_batch(config_path: &Path, input: &Path, output: &Path, format: OutputFormat) -> Result<()> {
    let config = ServiceConfig::load(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let pipeline = PredictionPipeline::from_config(config).context("Failed to load model")?;

    if !pipeline.schema().is_enabled() {
        debug!("Schema validation disabled");
    }

    let table = Table::read_csv_path(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let (prediction, summary) = pipeline
        .predict_batch_to(&table, output)
        .context("Batch prediction failed")?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            println!("Saved: {}", summary.saved);
            if summary.n_rows == 0 {
                print_warning("Input contained no rows");
            }
            let row = BatchRow {
                rows: summary.n_rows,
                branch: prediction.branch.as_str().to_string(),
                flagged: prediction.flagged,
                saved: summary.saved.clone(),
            };
            print_table(&[row], format);
        }
    }

    Ok(())
}
