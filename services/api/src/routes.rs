use crate::infra::{AppState, InMemoryMatterRepository, InMemorySourceStore};
use axum::body::Bytes;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use filing_binder::workflows::compilation::{
    compilation_router, CompilationService, Forum, MatterDocument, MatterFacts, MatterId,
    MatterRecord, MatterRepository, RuleCatalogStore,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Intake payload for the development matter store.
#[derive(Debug, Deserialize)]
pub(crate) struct MatterIntake {
    pub(crate) forum: Forum,
    #[serde(default)]
    pub(crate) subtype: Option<String>,
    #[serde(default)]
    pub(crate) compilation_profile_id: Option<String>,
    #[serde(default)]
    pub(crate) catalog_version: Option<String>,
    #[serde(default)]
    pub(crate) facts: MatterFacts,
    #[serde(default)]
    pub(crate) documents: Vec<MatterDocument>,
}

impl MatterIntake {
    fn into_record(self, matter_id: MatterId) -> MatterRecord {
        let mut record = MatterRecord::new(matter_id, self.forum);
        record.subtype = self.subtype;
        record.compilation_profile_id = self.compilation_profile_id;
        record.catalog_version = self.catalog_version;
        record.facts = self.facts;
        record.documents = self.documents;
        record
    }
}

#[derive(Clone)]
pub(crate) struct IntakeState {
    pub(crate) matters: Arc<InMemoryMatterRepository>,
    pub(crate) sources: Arc<InMemorySourceStore>,
}

pub(crate) fn with_compilation_routes<R, S>(
    service: Arc<CompilationService<R, S>>,
    intake: IntakeState,
) -> axum::Router
where
    R: MatterRepository + 'static,
    S: RuleCatalogStore + 'static,
{
    compilation_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/matters/:matter_id",
            axum::routing::put(upsert_matter_endpoint),
        )
        .route(
            "/api/v1/matters/:matter_id/documents/:file_id/content",
            axum::routing::put(upload_content_endpoint),
        )
        .layer(Extension(intake))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn upsert_matter_endpoint(
    Extension(intake): Extension<IntakeState>,
    Path(matter_id): Path<String>,
    Json(payload): Json<MatterIntake>,
) -> impl IntoResponse {
    let matter_id = MatterId::new(matter_id);
    let record = payload.into_record(matter_id.clone());
    let document_set_hash = record.document_set_hash();
    let documents = record.documents.len();
    intake.matters.upsert(record);

    info!(matter_id = %matter_id, documents, "matter intake stored");
    (
        StatusCode::OK,
        Json(json!({
            "matter_id": matter_id,
            "document_set_hash": document_set_hash,
            "documents": documents,
        })),
    )
}

pub(crate) async fn upload_content_endpoint(
    Extension(intake): Extension<IntakeState>,
    Path((matter_id, file_id)): Path<(String, String)>,
    body: Bytes,
) -> impl IntoResponse {
    if body.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "code": "VALIDATION_INPUT", "error": "empty document body" })),
        );
    }

    let byte_size = body.len();
    intake
        .sources
        .put(MatterId::new(matter_id), file_id.clone(), body.to_vec());
    (
        StatusCode::OK,
        Json(json!({ "file_id": file_id, "byte_size": byte_size })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use filing_binder::workflows::compilation::{EvaluationConfig, StaticCatalogStore};
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app() -> (axum::Router, IntakeState) {
        let intake = IntakeState {
            matters: Arc::new(InMemoryMatterRepository::default()),
            sources: Arc::new(InMemorySourceStore::default()),
        };
        let service = Arc::new(CompilationService::new(
            Arc::clone(&intake.matters),
            Arc::new(StaticCatalogStore::standard()),
            EvaluationConfig::default(),
        ));
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(handle),
        };
        let router = with_compilation_routes(service, intake.clone()).layer(Extension(state));
        (router, intake)
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn intake_then_readiness_round_trip() {
        let (router, intake) = app();
        let matter = json!({
            "forum": "rpd",
            "documents": [{
                "file_id": "claim",
                "filename": "claim.pdf",
                "classification": "application_for_protection",
                "classification_confidence": 0.97,
                "page_count": 8,
                "upload_status": "uploaded",
                "upload_sequence": 1
            }]
        });

        let response = router
            .clone()
            .oneshot(
                axum::http::Request::put("/api/v1/matters/rpd-7")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(axum::body::Body::from(matter.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(intake
            .matters
            .fetch(&MatterId::new("rpd-7"))
            .expect("fetch")
            .is_some());

        let response = router
            .oneshot(
                axum::http::Request::post("/api/v1/matters/rpd-7/readiness")
                    .body(axum::body::Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["is_ready"], json!(false));
        assert_eq!(body["missing_required_items"], json!(["hearing_notice"]));
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let (router, _) = app();
        let response = router
            .oneshot(
                axum::http::Request::put("/api/v1/matters/m-1/documents/f-1/content")
                    .body(axum::body::Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ready_endpoint_reflects_flag() {
        let (router, _) = app();
        let response = router
            .oneshot(
                axum::http::Request::get("/ready")
                    .body(axum::body::Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
