//! HTTP endpoint modules.
//!
//! Shared error types live here; each sub-module owns one area.

pub mod doc;
mod health;
mod jobs;
mod services;

use axum::http::StatusCode;
use axum::Json;
use netjobs_jobs::JobError;
use serde::Serialize;

// ── Shared types ─────────────────────────────────────────────────

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: msg.into() }))
}

/// Status code for a job-layer error on the submit path.
pub(crate) fn job_error(err: &JobError) -> ApiError {
    let status = match err {
        JobError::NotFound(_) | JobError::UnknownService(_) => StatusCode::NOT_FOUND,
        JobError::Malformed(_) | JobError::Rejected(_) => StatusCode::BAD_REQUEST,
        JobError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
    };
    api_error(status, err.to_string())
}

// ── Re-exports ───────────────────────────────────────────────────

pub use health::health;
pub use jobs::{fetch, jobs, status, terminate};
pub use services::{services, submit};
