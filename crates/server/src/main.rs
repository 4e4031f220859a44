//! Inference Server - tabular and text model prediction service
//!
//! Loads the configured model and optional input schema once at startup,
//! then serves single-record and CSV batch predictions over HTTP.

use anyhow::{Context, Result};
use inference_lib::{PredictionPipeline, ServiceConfig, ServiceMetrics, StructuredLogger};
use inference_server::{serve, AppState};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting inference-server");

    let config = ServiceConfig::load_default().context("failed to load configuration")?;
    let addr = config.socket_addr();
    let logger = StructuredLogger::new(&config.title);

    let pipeline = PredictionPipeline::from_config(config).context("failed to load model")?;
    let model_kind = pipeline.predictor().kind();
    let model_path = pipeline.config().model_path.display().to_string();

    let metrics = ServiceMetrics::new();
    metrics.set_model_info(model_kind, &model_path);
    logger.log_startup(SERVER_VERSION, model_kind, pipeline.schema().is_enabled());

    let state = Arc::new(AppState::new(pipeline, metrics, logger.clone()));

    serve(&addr, state, shutdown_signal()).await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
