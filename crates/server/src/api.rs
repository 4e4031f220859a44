//! HTTP API for predictions, health checks and Prometheus metrics

use crate::error::ApiError;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use inference_lib::{
    observability::mode, BatchSummary, PredictionPipeline, Record, ServiceMetrics,
    SinglePrediction, StructuredLogger, Table,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Largest accepted CSV upload
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: PredictionPipeline,
    pub metrics: ServiceMetrics,
    pub logger: StructuredLogger,
    pub output_path: PathBuf,
}

impl AppState {
    pub fn new(pipeline: PredictionPipeline, metrics: ServiceMetrics, logger: StructuredLogger) -> Self {
        let output_path = pipeline.config().output_path.clone();
        Self {
            pipeline,
            metrics,
            logger,
            output_path,
        }
    }

    /// Count a finished request and log it when it failed
    fn record<T>(&self, mode: &str, started: Instant, result: &Result<T, ApiError>) {
        self.metrics
            .observe_request(mode, started.elapsed().as_secs_f64(), result.is_ok());
        if let Err(err) = result {
            self.metrics.inc_error(err.kind());
            self.logger.log_rejected(mode, err.kind(), &err.to_string());
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictOneRequest {
    pub features: Record,
}

/// Score a single record
async fn predict_one(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictOneRequest>, JsonRejection>,
) -> Result<Json<SinglePrediction>, ApiError> {
    let started = Instant::now();
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let result: Result<Json<SinglePrediction>, ApiError> = Err(ApiError::from(rejection));
            state.record(mode::SINGLE, started, &result);
            return result;
        }
    };
    let pipeline = state.pipeline.clone();

    let result = tokio::task::spawn_blocking(move || pipeline.predict_one(&request.features))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
        .and_then(|scored| scored.map_err(ApiError::from));

    state.record(mode::SINGLE, started, &result);
    if result.is_ok() {
        state.metrics.add_rows_scored(1);
    }
    result.map(Json)
}

/// Read the uploaded CSV from the `file` field, falling back to the first field
async fn read_upload(mut multipart: Multipart) -> Result<Table, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?
    {
        let is_file = field.name() == Some("file");
        if upload.is_some() && !is_file {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        upload = Some(bytes);
        if is_file {
            break;
        }
    }

    let bytes = upload.ok_or_else(|| ApiError::InvalidRequest("no file uploaded".to_string()))?;
    Table::read_csv(bytes.as_ref()).map_err(|e| ApiError::Pipeline(e.into()))
}

/// Score an uploaded CSV and write the result to the configured output path
async fn predict_csv(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<BatchSummary>, ApiError> {
    let started = Instant::now();

    let result = match read_upload(multipart).await {
        Ok(table) => {
            let pipeline = state.pipeline.clone();
            let output_path = state.output_path.clone();
            tokio::task::spawn_blocking(move || pipeline.predict_batch_to(&table, &output_path))
                .await
                .map_err(|e| ApiError::Internal(e.to_string()))
                .and_then(|scored| scored.map_err(ApiError::from))
        }
        Err(err) => Err(err),
    };

    state.record(mode::BATCH, started, &result);
    let (prediction, summary) = result?;

    state.metrics.add_rows_scored(prediction.n_rows());
    if let Some(flagged) = prediction.flagged {
        state.metrics.add_rows_flagged(flagged);
    }
    state.logger.log_batch(
        prediction.n_rows(),
        prediction.branch.as_str(),
        prediction.flagged,
        Some(&summary.saved),
    );

    Ok(Json(summary))
}

/// Liveness check
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// One log line per request
async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    info!(
        method = %method,
        path = %path,
        status = status,
        latency_ms = started.elapsed().as_millis() as u64,
        "{} {} -> {}",
        method,
        path,
        status
    );
    response
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict_one", post(predict_one))
        .route("/predict_csv", post(predict_csv))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
