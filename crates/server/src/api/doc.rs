//! OpenAPI documentation aggregator.
//!
//! Collects the `#[utoipa::path]`-annotated handlers and `ToSchema` types
//! into one OpenAPI 3.1 spec, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "netjobs API",
        version = "0.1.0",
        description = "Asynchronous graph-analysis jobs: submit a graph, poll the job, fetch the result.",
    ),
    tags(
        (name = "Health", description = "Server liveness"),
        (name = "Services", description = "Algorithm catalog and job submission"),
        (name = "Jobs", description = "Polling, result fetch, termination and listing"),
    ),
    paths(
        crate::api::health::health,
        crate::api::services::services,
        crate::api::services::submit,
        crate::api::jobs::status,
        crate::api::jobs::fetch,
        crate::api::jobs::terminate,
        crate::api::jobs::jobs,
    ),
    components(schemas(
        crate::api::ErrorResponse,
        crate::api::health::HealthResponse,
        crate::api::services::ServiceInfo,
        crate::api::services::ServicesResponse,
        crate::api::services::SubmitResponse,
        crate::api::jobs::TerminateResponse,
        crate::api::jobs::JobView,
        crate::api::jobs::JobsResponse,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/services",
            "/service/{algorithm}",
            "/status/{job_id}",
            "/fetch/{job_id}",
            "/terminate/{job_id}",
            "/jobs",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
    }
}
