//! HTTP error mapping for pipeline failures

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use inference_lib::{PipelineError, TableError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Machine-readable kind, shared with the metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Pipeline(err) => err.kind(),
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Pipeline(PipelineError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Pipeline(PipelineError::Reconciliation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(PipelineError::Inference(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Pipeline(PipelineError::Table(TableError::Io { .. })) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Pipeline(PipelineError::Table(_)) => StatusCode::BAD_REQUEST,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    pub code: u16,
    /// Individual schema violations, one per failing constraint
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let details = match &self {
            ApiError::Pipeline(PipelineError::Validation(err)) => {
                err.violations.iter().map(ToString::to_string).collect()
            }
            _ => Vec::new(),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            kind: self.kind().to_string(),
            code: status.as_u16(),
            details,
        });

        (status, body).into_response()
    }
}
