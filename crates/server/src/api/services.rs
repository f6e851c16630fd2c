//! Service catalog and job submission.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use netjobs_compute::{AlgorithmKind, AlgorithmOptions};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{api_error, job_error, ApiError, ErrorResponse};
use crate::state::AppState;

/// Multipart field carrying the graph JSON.
const DATA_FIELD: &str = "data";

#[derive(Serialize, utoipa::ToSchema)]
pub struct ServiceInfo {
    pub name: String,
    /// `clustering` or `embedding`.
    pub kind: String,
    pub options: Vec<&'static str>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ServicesResponse {
    pub algorithms: Vec<String>,
    pub services: Vec<ServiceInfo>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmitResponse {
    pub job_id: Uuid,
}

/// List registered algorithm services.
#[utoipa::path(
    get,
    path = "/services",
    tag = "Services",
    responses(
        (status = 200, description = "Registered services", body = ServicesResponse)
    )
)]
pub async fn services(State(state): State<Arc<AppState>>) -> Json<ServicesResponse> {
    let services: Vec<ServiceInfo> = state
        .services
        .handlers()
        .map(|handler| ServiceInfo {
            name: handler.name().to_string(),
            kind: match handler.kind() {
                AlgorithmKind::Clustering => "clustering".to_string(),
                AlgorithmKind::Embedding => "embedding".to_string(),
            },
            options: handler.options().to_vec(),
        })
        .collect();
    Json(ServicesResponse {
        algorithms: services.iter().map(|s| s.name.clone()).collect(),
        services,
    })
}

/// Submit a graph to an algorithm service.
///
/// The body is multipart/form-data with the graph JSON in the `data`
/// field; algorithm options are query parameters. Returns as soon as the
/// job is registered.
#[utoipa::path(
    post,
    path = "/service/{algorithm}",
    tag = "Services",
    params(
        ("algorithm" = String, Path, description = "Service name, e.g. leiden"),
    ),
    request_body(content_type = "multipart/form-data", description = "Field `data`: {\"nodes\": [...], \"edges\": [[from, to, weight], ...]}"),
    responses(
        (status = 200, description = "Job created", body = SubmitResponse),
        (status = 400, description = "Malformed payload or options", body = ErrorResponse),
        (status = 404, description = "Unknown service", body = ErrorResponse),
        (status = 503, description = "Server is shutting down", body = ErrorResponse)
    )
)]
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Path(algorithm): Path<String>,
    query: Result<Query<AlgorithmOptions>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let handler = state.services.get(&algorithm).map_err(|e| job_error(&e))?;
    let options = query_or_400(query)?;
    let multipart = multipart.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;
    let payload = read_data_field(multipart).await?;

    match handler.submit(&payload, options).await {
        Ok(job_id) => {
            info!(job_id = %job_id, algorithm = %algorithm, bytes = payload.len(), "accepted submission");
            Ok(Json(SubmitResponse { job_id }))
        }
        Err(e) => {
            warn!(algorithm = %algorithm, error = %e, "rejected submission");
            Err(job_error(&e))
        }
    }
}

fn query_or_400<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(value)| value)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))
}

async fn read_data_field(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Multipart error: {e}")))?
    {
        if field.name() != Some(DATA_FIELD) {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Failed to read '{DATA_FIELD}': {e}")))?;
        return Ok(bytes.to_vec());
    }
    Err(api_error(
        StatusCode::BAD_REQUEST,
        format!("multipart field '{DATA_FIELD}' is missing"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Limit {
        #[allow(dead_code)]
        n: u32,
    }

    #[test]
    fn query_rejection_becomes_json_400() {
        let uri: Uri = "/service/leiden?n=lots".parse().unwrap();
        let (status, Json(body)) = query_or_400(Query::<Limit>::try_from_uri(&uri)).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("Failed to deserialize query string"), "{}", body.error);
    }

    #[test]
    fn accepted_query_is_unwrapped() {
        let uri: Uri = "/service/leiden?seed=3&resolution=0.5".parse().unwrap();
        let options = query_or_400(Query::<AlgorithmOptions>::try_from_uri(&uri)).unwrap();
        assert_eq!(options, [("resolution", "0.5"), ("seed", "3")].into_iter().collect::<AlgorithmOptions>());
    }
}
