//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use inference_lib::SinglePrediction;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a single value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a probability as a percentage
pub fn format_probability(proba: f64) -> String {
    format!("{:.1}%", proba * 100.0)
}

/// Color a probability by how confidently it leans either way
pub fn color_probability(proba: f64) -> String {
    let formatted = format_probability(proba);
    if !(0.2..=0.8).contains(&proba) {
        formatted.green().to_string()
    } else if !(0.4..=0.6).contains(&proba) {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color a class label
pub fn color_label(label: u8) -> String {
    match label {
        1 => "1".green().bold().to_string(),
        _ => "0".normal().to_string(),
    }
}

/// One-line rendering of a single prediction
pub fn describe_prediction(prediction: &SinglePrediction) -> String {
    match prediction {
        SinglePrediction::Probability { proba, label } => format!(
            "probability {} (proba={}), label {}",
            color_probability(*proba),
            proba,
            color_label(*label)
        ),
        SinglePrediction::Value { pred } => format!("prediction {}", pred.to_string().cyan()),
    }
}
