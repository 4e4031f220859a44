//! HTTP surface for the inference service

pub mod api;
pub mod error;

pub use api::{create_router, serve, AppState};
pub use error::{ApiError, ErrorResponse};
