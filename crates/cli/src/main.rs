//! Tabular Inference Service CLI
//!
//! Runs batch predictions locally against a model on disk, or talks to a
//! running inference server.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{predict, remote};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Tabular Inference Service CLI
#[derive(Parser)]
#[command(name = "infer")]
#[command(author, version, about = "CLI for the Tabular Inference Service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via INFER_API_URL env var)
    #[arg(long, env = "INFER_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score a CSV file locally and write the predictions
    Predict {
        /// Input CSV file
        #[arg(long, short)]
        input: PathBuf,

        /// Output CSV file
        #[arg(long, short, default_value = "predictions.csv")]
        output: PathBuf,

        /// Service configuration file
        #[arg(long, short, env = "CONFIG_PATH", default_value = "config.yaml")]
        config: PathBuf,
    },

    /// Call a running inference server
    #[command(subcommand)]
    Remote(RemoteCommands),
}

#[derive(Subcommand)]
pub enum RemoteCommands {
    /// Check server liveness
    Health,

    /// Score a single record
    PredictOne {
        /// Record as inline JSON or a path to a JSON file
        #[arg(long)]
        features: String,
    },

    /// Upload a CSV file for batch scoring
    PredictCsv {
        /// CSV file to upload
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Predict {
            input,
            output,
            config,
        } => {
            // Model scoring is CPU-bound; keep it off the async workers
            let format = cli.format;
            tokio::task::spawn_blocking(move || predict::run_batch(&config, &input, &output, format))
                .await??;
        }
        Commands::Remote(remote_cmd) => {
            let client = client::ApiClient::new(&cli.api_url)?;
            match remote_cmd {
                RemoteCommands::Health => remote::health(&client, cli.format).await?,
                RemoteCommands::PredictOne { features } => {
                    remote::predict_one(&client, &features, cli.format).await?;
                }
                RemoteCommands::PredictCsv { file } => {
                    remote::predict_csv(&client, &file, cli.format).await?;
                }
            }
        }
    }

    Ok(())
}
