//! Job polling, result fetch, termination and listing.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use netjobs_jobs::{JobError, JobId, JobSummary};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{api_error, ApiError, ErrorResponse};
use crate::state::AppState;

#[derive(Serialize, utoipa::ToSchema)]
pub struct TerminateResponse {
    pub job_id: String,
    pub terminated: bool,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct JobView {
    pub job_id: Uuid,
    pub algorithm: String,
    pub owner: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<JobSummary> for JobView {
    fn from(summary: JobSummary) -> Self {
        Self {
            job_id: summary.job.id,
            algorithm: summary.job.algorithm,
            owner: summary.job.owner,
            state: summary.state.to_string(),
            created_at: summary.job.created_at,
            updated_at: summary.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct JobsResponse {
    pub jobs: Vec<JobView>,
}

/// An id that does not parse can never have been issued.
fn lookup_id(raw: &str) -> Result<JobId, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("no such job: {raw}"))
}

/// Current state of a job as plain text: `pending`, `running`, `done` or `error`.
#[utoipa::path(
    get,
    path = "/status/{job_id}",
    tag = "Jobs",
    params(("job_id" = String, Path, description = "Job id returned by submit")),
    responses(
        (status = 200, description = "Job state", body = String, content_type = "text/plain"),
        (status = 404, description = "Unknown or terminated job", body = ErrorResponse)
    )
)]
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<&'static str, ApiError> {
    let id = lookup_id(&job_id).map_err(|msg| api_error(StatusCode::NOT_FOUND, msg))?;
    state
        .lifecycle
        .status(id)
        .map(|s| s.as_str())
        .map_err(|e| api_error(StatusCode::NOT_FOUND, e.to_string()))
}

/// Status fields merged with the result, once there is one.
#[utoipa::path(
    get,
    path = "/fetch/{job_id}",
    tag = "Jobs",
    params(("job_id" = String, Path, description = "Job id returned by submit")),
    responses(
        (status = 200, description = "Status and result fields", body = Object),
        (status = 400, description = "Unknown or terminated job", body = ErrorResponse)
    )
)]
pub async fn fetch(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = lookup_id(&job_id).map_err(|msg| api_error(StatusCode::BAD_REQUEST, msg))?;
    match state.lifecycle.fetch(id) {
        Ok(merged) => Ok(Json(merged)),
        Err(e @ JobError::NotFound(_)) => Err(api_error(StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// Stop tracking a job. Always succeeds, whether or not the job existed.
#[utoipa::path(
    get,
    path = "/terminate/{job_id}",
    tag = "Jobs",
    params(("job_id" = String, Path, description = "Job id returned by submit")),
    responses(
        (status = 200, description = "Job is no longer tracked", body = TerminateResponse)
    )
)]
pub async fn terminate(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Json<TerminateResponse> {
    match lookup_id(&job_id) {
        Ok(id) => {
            state.lifecycle.terminate(id);
        }
        Err(_) => debug!(job_id, "terminate with unparseable id"),
    }
    Json(TerminateResponse {
        job_id,
        terminated: true,
    })
}

/// Live jobs in submission order.
#[utoipa::path(
    get,
    path = "/jobs",
    tag = "Jobs",
    responses(
        (status = 200, description = "Live jobs", body = JobsResponse)
    )
)]
pub async fn jobs(State(state): State<Arc<AppState>>) -> Json<JobsResponse> {
    Json(JobsResponse {
        jobs: state.lifecycle.jobs().into_iter().map(JobView::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_ids_read_as_unknown() {
        assert_eq!(lookup_id("not-a-uuid").unwrap_err(), "no such job: not-a-uuid");
        let id = Uuid::new_v4();
        assert_eq!(lookup_id(&id.to_string()).unwrap(), id);
    }
}
