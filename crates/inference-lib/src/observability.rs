//! Observability infrastructure for the inference service
//!
//! Provides:
//! - Prometheus metrics (request latency, rows scored, errors by kind, model info)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter, register_int_counter_vec,
    GaugeVec, HistogramVec, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct ServiceMetricsInner {
    request_latency_seconds: HistogramVec,
    requests_total: IntCounterVec,
    rows_scored: IntCounter,
    rows_flagged: IntCounter,
    errors_total: IntCounterVec,
    model_info: GaugeVec,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            request_latency_seconds: register_histogram_vec!(
                "inference_request_latency_seconds",
                "Time spent handling a prediction request end to end",
                &["mode"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register request_latency_seconds"),

            requests_total: register_int_counter_vec!(
                "inference_requests_total",
                "Prediction requests by mode and outcome",
                &["mode", "outcome"]
            )
            .expect("Failed to register requests_total"),

            rows_scored: register_int_counter!(
                "inference_rows_scored_total",
                "Total number of rows passed through the model"
            )
            .expect("Failed to register rows_scored"),

            rows_flagged: register_int_counter!(
                "inference_rows_flagged_total",
                "Total number of rows marked by top-K flagging"
            )
            .expect("Failed to register rows_flagged"),

            errors_total: register_int_counter_vec!(
                "inference_errors_total",
                "Failed prediction requests by error kind",
                &["kind"]
            )
            .expect("Failed to register errors_total"),

            model_info: register_gauge_vec!(
                "inference_model_info",
                "Information about the currently loaded model",
                &["kind", "path"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Request mode label values
pub mod mode {
    pub const SINGLE: &str = "single";
    pub const BATCH: &str = "batch";
}

/// Service metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    /// Record a finished request
    pub fn observe_request(&self, mode: &str, duration_secs: f64, success: bool) {
        let inner = self.inner();
        inner
            .request_latency_seconds
            .with_label_values(&[mode])
            .observe(duration_secs);
        let outcome = if success { "success" } else { "error" };
        inner.requests_total.with_label_values(&[mode, outcome]).inc();
    }

    pub fn add_rows_scored(&self, rows: usize) {
        self.inner().rows_scored.inc_by(rows as u64);
    }

    pub fn add_rows_flagged(&self, rows: usize) {
        self.inner().rows_flagged.inc_by(rows as u64);
    }

    /// Increment the error counter for one error kind
    pub fn inc_error(&self, kind: &str) {
        self.inner().errors_total.with_label_values(&[kind]).inc();
    }

    /// Update loaded model info
    pub fn set_model_info(&self, kind: &str, path: &str) {
        self.inner().model_info.reset();
        self.inner()
            .model_info
            .with_label_values(&[kind, path])
            .set(1.0);
    }
}

/// Structured logger for service events
///
/// Provides consistent JSON-formatted logging for startup, batch
/// predictions and shutdown.
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Log service startup
    pub fn log_startup(&self, version: &str, model_kind: &str, schema_enabled: bool) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            model_kind = %model_kind,
            schema_enabled = schema_enabled,
            "Inference service started"
        );
    }

    /// Log a completed batch prediction
    pub fn log_batch(&self, rows: usize, branch: &str, flagged: Option<usize>, saved: Option<&str>) {
        info!(
            event = "batch_predicted",
            service = %self.service,
            rows = rows,
            branch = %branch,
            flagged = ?flagged,
            saved = ?saved,
            "Batch prediction completed"
        );
    }

    /// Log a rejected request
    pub fn log_rejected(&self, mode: &str, kind: &str, error: &str) {
        warn!(
            event = "request_rejected",
            service = %self.service,
            mode = %mode,
            kind = %kind,
            error = %error,
            "Prediction request rejected"
        );
    }

    /// Log service shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Inference service shutting down"
        );
    }
}
