use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::error;

use super::catalog::RuleCatalogStore;
use super::domain::MatterId;
use super::repository::MatterRepository;
use super::service::{CompilationError, CompilationService, PackageRequest, ReadinessRequest};

const SHA256_HEADER: HeaderName = HeaderName::from_static("x-binder-sha256");

/// Router builder exposing readiness, packaging, download, and the support matrix.
pub fn compilation_router<R, S>(service: Arc<CompilationService<R, S>>) -> Router
where
    R: MatterRepository + 'static,
    S: RuleCatalogStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/matters/:matter_id/readiness",
            post(readiness_handler::<R, S>),
        )
        .route(
            "/api/v1/matters/:matter_id/package",
            post(package_handler::<R, S>),
        )
        .route(
            "/api/v1/matters/:matter_id/download",
            get(download_handler::<R, S>),
        )
        .route("/api/v1/support-matrix", get(support_matrix_handler::<R, S>))
        .with_state(service)
}

pub(crate) async fn readiness_handler<R, S>(
    State(service): State<Arc<CompilationService<R, S>>>,
    Path(matter_id): Path<String>,
    body: Bytes,
) -> Response
where
    R: MatterRepository + 'static,
    S: RuleCatalogStore + 'static,
{
    let request: ReadinessRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(error) => return error_response(&error),
    };

    let matter_id = MatterId::new(matter_id);
    match run_blocking("readiness", move || service.readiness(&matter_id, &request)).await {
        Ok(Ok(state)) => (StatusCode::OK, axum::Json(state)).into_response(),
        Ok(Err(error)) => error_response(&error),
        Err(response) => response,
    }
}

pub(crate) async fn package_handler<R, S>(
    State(service): State<Arc<CompilationService<R, S>>>,
    Path(matter_id): Path<String>,
    body: Bytes,
) -> Response
where
    R: MatterRepository + 'static,
    S: RuleCatalogStore + 'static,
{
    let request: PackageRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(error) => return error_response(&error),
    };

    let matter_id = MatterId::new(matter_id);
    match run_blocking("package", move || service.package(&matter_id, &request)).await {
        Ok(Ok(response)) => (StatusCode::OK, axum::Json(response)).into_response(),
        Ok(Err(error)) => error_response(&error),
        Err(response) => response,
    }
}

pub(crate) async fn download_handler<R, S>(
    State(service): State<Arc<CompilationService<R, S>>>,
    Path(matter_id): Path<String>,
) -> Response
where
    R: MatterRepository + 'static,
    S: RuleCatalogStore + 'static,
{
    let matter_id = MatterId::new(matter_id);
    let outcome = match run_blocking("download", move || service.download(&matter_id)).await {
        Ok(outcome) => outcome,
        Err(response) => return response,
    };

    match outcome {
        Ok(binder) => {
            let headers = [
                (header::CONTENT_TYPE, mime::APPLICATION_PDF.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", binder.filename),
                ),
                (SHA256_HEADER, binder.sha256),
            ];
            (StatusCode::OK, headers, binder.bytes).into_response()
        }
        Err(error) => error_response(&error),
    }
}

/// Service calls wait on the per-matter lock and on binder assembly; keep them off the
/// async workers.
async fn run_blocking<T, F>(operation: &'static str, work: F) -> Result<T, Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|join_error| {
        error!(operation, error = %join_error, "blocking task failed");
        let payload = json!({
            "code": "INTERNAL",
            "error": format!("{operation} task failed"),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
    })
}

pub(crate) async fn support_matrix_handler<R, S>(
    State(service): State<Arc<CompilationService<R, S>>>,
) -> Response
where
    R: MatterRepository + 'static,
    S: RuleCatalogStore + 'static,
{
    (StatusCode::OK, axum::Json(service.support_matrix())).into_response()
}

/// Empty bodies select every default.
fn parse_body<T>(body: &[u8]) -> Result<T, CompilationError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| CompilationError::ValidationInput(format!("malformed request body: {err}")))
}

pub(crate) fn error_response(error: &CompilationError) -> Response {
    let mut payload = json!({
        "code": error.code(),
        "error": error.to_string(),
        "remediation": error.remediation(),
        "source_url": error.source_url(),
    });

    if let CompilationError::PolicyBlocked { blocking_issues } = error {
        payload["blocking_issues"] = json!(blocking_issues);
    }
    if !error.alternatives().is_empty() {
        payload["supported"] = json!(error.alternatives());
    }

    (error.status_code(), axum::Json(payload)).into_response()
}
