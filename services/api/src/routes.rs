use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use seo_audit::audit::{
    audit_router, AuditOrchestrator, AuditRunRepository, ContentAccessor, FieldValue,
    RequestQueue,
};
use seo_audit::error::AppError;
use seo_audit::placeholder::{extract_placeholders, MissingFieldPolicy, PlaceholderResolver};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct PlaceholderPreviewRequest {
    pub(crate) template: String,
    #[serde(default)]
    pub(crate) fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub(crate) globals: BTreeMap<String, String>,
    #[serde(default)]
    pub(crate) missing: MissingFieldPolicy,
}

#[derive(Debug, Serialize)]
pub(crate) struct PlaceholderPreviewResponse {
    pub(crate) resolved: String,
    pub(crate) placeholders: Vec<String>,
}

pub(crate) fn with_service_routes<C, R, Q>(
    orchestrator: Arc<AuditOrchestrator<C, R, Q>>,
) -> axum::Router
where
    C: ContentAccessor + 'static,
    R: AuditRunRepository + 'static,
    Q: RequestQueue + 'static,
{
    audit_router(orchestrator)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/placeholders/preview",
            axum::routing::post(placeholder_preview_endpoint),
        )
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

/// Resolve a bulk-edit template against sample fields before it is applied.
pub(crate) async fn placeholder_preview_endpoint(
    Json(payload): Json<PlaceholderPreviewRequest>,
) -> Result<Json<PlaceholderPreviewResponse>, AppError> {
    let PlaceholderPreviewRequest {
        template,
        fields,
        globals,
        missing,
    } = payload;

    let resolver = globals
        .into_iter()
        .fold(PlaceholderResolver::new(missing), |resolver, (name, value)| {
            resolver.with_global(name, value)
        });
    let resolved = resolver.resolve(&template, &fields)?;
    let placeholders = extract_placeholders(&template)?.into_iter().collect();

    Ok(Json(PlaceholderPreviewResponse {
        resolved,
        placeholders,
    }))
}
