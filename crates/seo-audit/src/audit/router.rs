use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::comparison::{compare, ComparisonPolicy};
use super::content::ContentAccessor;
use super::domain::{AuditRunId, RequestId, Scope};
use super::orchestrator::{AuditOrchestrator, OrchestratorError};
use super::repository::{AuditRunRepository, RequestQueue};

/// Body for synchronous runs and scheduled requests; a missing scope means the whole site.
#[derive(Debug, Default, Deserialize)]
pub struct ScopeBody {
    #[serde(default)]
    pub scope: Option<Scope>,
}

impl ScopeBody {
    fn into_scope(self) -> Scope {
        self.scope.unwrap_or(Scope::All)
    }
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub baseline: String,
    pub current: String,
    #[serde(default)]
    pub allow_failed: bool,
}

/// Router exposing audit runs, the request queue and run comparison.
pub fn audit_router<C, R, Q>(orchestrator: Arc<AuditOrchestrator<C, R, Q>>) -> Router
where
    C: ContentAccessor + 'static,
    R: AuditRunRepository + 'static,
    Q: RequestQueue + 'static,
{
    Router::new()
        .route("/api/v1/audits", post(start_handler::<C, R, Q>))
        .route("/api/v1/audits/requests", post(enqueue_handler::<C, R, Q>))
        .route(
            "/api/v1/audits/requests/:request_id",
            get(request_handler::<C, R, Q>),
        )
        .route("/api/v1/audits/runs/:run_id", get(run_handler::<C, R, Q>))
        .route("/api/v1/audits/compare", get(compare_handler::<C, R, Q>))
        .with_state(orchestrator)
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}

fn orchestrator_error(err: OrchestratorError) -> Response {
    match err {
        OrchestratorError::RunConflict { holder } => {
            let payload = json!({
                "error": "an overlapping audit run is already active",
                "holder": holder,
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        err @ (OrchestratorError::RunNotFound(_) | OrchestratorError::RequestNotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, err)
        }
        err @ OrchestratorError::InvalidTransition { .. } => {
            error_response(StatusCode::CONFLICT, err)
        }
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other),
    }
}

pub(crate) async fn start_handler<C, R, Q>(
    State(orchestrator): State<Arc<AuditOrchestrator<C, R, Q>>>,
    axum::Json(body): axum::Json<ScopeBody>,
) -> Response
where
    C: ContentAccessor + 'static,
    R: AuditRunRepository + 'static,
    Q: RequestQueue + 'static,
{
    match orchestrator.start_run(body.into_scope()).await {
        Ok(run) => (StatusCode::OK, axum::Json(run.summary())).into_response(),
        Err(err) => orchestrator_error(err),
    }
}

pub(crate) async fn enqueue_handler<C, R, Q>(
    State(orchestrator): State<Arc<AuditOrchestrator<C, R, Q>>>,
    axum::Json(body): axum::Json<ScopeBody>,
) -> Response
where
    C: ContentAccessor + 'static,
    R: AuditRunRepository + 'static,
    Q: RequestQueue + 'static,
{
    match orchestrator.enqueue(body.into_scope()) {
        Ok(enqueued) => {
            let payload = json!({
                "request_id": enqueued.request.id,
                "status": enqueued.request.status.label(),
                "coalesced": enqueued.coalesced,
            });
            (StatusCode::ACCEPTED, axum::Json(payload)).into_response()
        }
        Err(err) => orchestrator_error(err),
    }
}

pub(crate) async fn request_handler<C, R, Q>(
    State(orchestrator): State<Arc<AuditOrchestrator<C, R, Q>>>,
    Path(request_id): Path<String>,
) -> Response
where
    C: ContentAccessor + 'static,
    R: AuditRunRepository + 'static,
    Q: RequestQueue + 'static,
{
    match orchestrator.request(&RequestId(request_id)) {
        Ok(request) => (StatusCode::OK, axum::Json(request)).into_response(),
        Err(err) => orchestrator_error(err),
    }
}

pub(crate) async fn run_handler<C, R, Q>(
    State(orchestrator): State<Arc<AuditOrchestrator<C, R, Q>>>,
    Path(run_id): Path<String>,
) -> Response
where
    C: ContentAccessor + 'static,
    R: AuditRunRepository + 'static,
    Q: RequestQueue + 'static,
{
    match orchestrator.run(&AuditRunId(run_id)) {
        Ok(run) => (StatusCode::OK, axum::Json(run.summary())).into_response(),
        Err(err) => orchestrator_error(err),
    }
}

pub(crate) async fn compare_handler<C, R, Q>(
    State(orchestrator): State<Arc<AuditOrchestrator<C, R, Q>>>,
    Query(query): Query<CompareQuery>,
) -> Response
where
    C: ContentAccessor + 'static,
    R: AuditRunRepository + 'static,
    Q: RequestQueue + 'static,
{
    let runs = orchestrator
        .run(&AuditRunId(query.baseline))
        .and_then(|baseline| Ok((baseline, orchestrator.run(&AuditRunId(query.current))?)));
    let (baseline, current) = match runs {
        Ok(pair) => pair,
        Err(err) => return orchestrator_error(err),
    };

    let policy = ComparisonPolicy {
        allow_failed: query.allow_failed,
    };
    match compare(&baseline, &current, &policy) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => error_response(StatusCode::UNPROCESSABLE_ENTITY, err),
    }
}
