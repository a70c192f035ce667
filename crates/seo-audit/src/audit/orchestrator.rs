use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::content::ContentAccessor;
use super::domain::{
    AuditRun, AuditRunId, ContentUnitId, RequestId, RequestStatus, RunStatus, Scope,
    ScheduledAuditRequest,
};
use super::lock::{LockError, ScopeLease, ScopeLock};
use super::pipeline::CheckerPipeline;
use super::repository::{AuditRunRepository, Enqueued, RepositoryError, RequestQueue};
use super::scoring;

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_run_id() -> AuditRunId {
    let id = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AuditRunId(format!("run-{id:06}"))
}

fn next_request_id() -> RequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RequestId(format!("req-{id:06}"))
}

/// Result of processing one scheduled request.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledOutcome {
    pub request: ScheduledAuditRequest,
    /// Absent when the scope lease could not be taken.
    pub run: Option<AuditRun>,
}

/// Owns the audit run lifecycle: leases, pipeline execution, scoring and the request queue.
pub struct AuditOrchestrator<C, R, Q> {
    content: Arc<C>,
    runs: Arc<R>,
    requests: Arc<Q>,
    lock: Arc<dyn ScopeLock>,
    pipeline: Arc<CheckerPipeline>,
}

impl<C, R, Q> AuditOrchestrator<C, R, Q>
where
    C: ContentAccessor + 'static,
    R: AuditRunRepository + 'static,
    Q: RequestQueue + 'static,
{
    pub fn new(
        content: Arc<C>,
        runs: Arc<R>,
        requests: Arc<Q>,
        lock: Arc<dyn ScopeLock>,
        pipeline: Arc<CheckerPipeline>,
    ) -> Self {
        Self {
            content,
            runs,
            requests,
            lock,
            pipeline,
        }
    }

    pub fn runs(&self) -> &Arc<R> {
        &self.runs
    }

    /// Synchronous audit. Rejected with [`OrchestratorError::RunConflict`] while an
    /// overlapping run holds the scope; nothing is persisted in that case.
    pub async fn start_run(&self, scope: Scope) -> Result<AuditRun, OrchestratorError> {
        self.execute(scope.normalized(), None).await
    }

    async fn execute(
        &self,
        scope: Scope,
        request_id: Option<RequestId>,
    ) -> Result<AuditRun, OrchestratorError> {
        let run_id = next_run_id();
        let _lease = ScopeLease::acquire(self.lock.clone(), &run_id, &scope).map_err(|err| {
            match err {
                LockError::Conflict { holder } => {
                    warn!(scope = %scope.label(), %holder, "audit run rejected, scope busy");
                    OrchestratorError::RunConflict { holder }
                }
                LockError::Unavailable(reason) => OrchestratorError::LockUnavailable(reason),
            }
        })?;

        let mut pending = AuditRun::pending(run_id, scope, Utc::now());
        pending.request_id = request_id;
        let mut run = self.runs.insert(pending)?;

        run.status = RunStatus::Running;
        run.started_at = Some(Utc::now());
        if let Err(err) = self.runs.update(&run) {
            return Ok(self.fail(run, format!("storing run state failed: {err}")));
        }
        info!(run = %run.id, scope = %run.scope.label(), "audit run started");

        let units = match self.content.list_units(&run.scope).await {
            Ok(units) => units,
            Err(err) => return Ok(self.fail(run, format!("content accessor failed: {err}"))),
        };
        let order: HashMap<ContentUnitId, usize> = units
            .iter()
            .enumerate()
            .map(|(index, unit)| (unit.id.clone(), index))
            .collect();

        let cache = self.pipeline.prepare(&units).await;
        let mut failure = None;
        {
            let mut results = self.pipeline.stream(units, &cache);
            while let Some(unit) = results.next().await {
                if let Err(err) = self.runs.append_findings(&run.id, &unit.findings) {
                    failure = Some(format!("storing findings failed: {err}"));
                    break;
                }
                debug!(
                    run = %run.id,
                    unit = %unit.unit_id,
                    findings = unit.findings.len(),
                    "unit audited"
                );
                run.units_audited.push(unit.unit_id);
                run.findings.extend(unit.findings);
            }
        }

        // Stable retrieval order: scope order across units, checker order within a unit.
        let position = |id: &ContentUnitId| order.get(id).copied().unwrap_or(usize::MAX);
        run.units_audited.sort_by_key(|id| position(id));
        run.findings
            .sort_by_key(|finding| position(&finding.content_unit_id));

        if let Some(reason) = failure {
            return Ok(self.fail(run, reason));
        }

        run.score = scoring::score(&run.findings, run.units_audited.len());
        run.status = RunStatus::Completed;
        run.completed_at = Some(Utc::now());
        if let Err(err) = self.runs.update(&run) {
            return Ok(self.fail(run, format!("storing run state failed: {err}")));
        }
        info!(
            run = %run.id,
            score = run.score,
            units = run.units_audited.len(),
            findings = run.findings.len(),
            "audit run completed"
        );
        Ok(run)
    }

    fn fail(&self, mut run: AuditRun, reason: String) -> AuditRun {
        warn!(run = %run.id, %reason, "audit run failed");
        run.score = scoring::score(&run.findings, run.units_audited.len());
        run.status = RunStatus::Failed;
        run.completed_at = Some(Utc::now());
        run.failure_reason = Some(reason);
        if let Err(err) = self.runs.update(&run) {
            warn!(run = %run.id, error = %err, "failed run could not be persisted");
        }
        run
    }

    /// Queue an audit; identical queued scopes coalesce into one request.
    pub fn enqueue(&self, scope: Scope) -> Result<Enqueued, OrchestratorError> {
        let candidate = ScheduledAuditRequest {
            id: next_request_id(),
            scope: scope.normalized(),
            requested_at: Utc::now(),
            status: RequestStatus::Queued,
            claimed_at: None,
            run_id: None,
        };
        let enqueued = self.requests.enqueue(candidate)?;
        info!(
            request = %enqueued.request.id,
            scope = %enqueued.request.scope.label(),
            coalesced = enqueued.coalesced,
            "audit request queued"
        );
        Ok(enqueued)
    }

    /// Claim the oldest queued request whose scope is not held by a running audit.
    pub fn claim_next(&self) -> Result<Option<ScheduledAuditRequest>, OrchestratorError> {
        let lock = self.lock.clone();
        let eligible = move |request: &ScheduledAuditRequest| !lock.is_contended(&request.scope);
        Ok(self.requests.claim_next(&eligible, Utc::now())?)
    }

    pub async fn run_next_scheduled(&self) -> Result<Option<ScheduledOutcome>, OrchestratorError> {
        match self.claim_next()? {
            Some(request) => self.process_claimed(request).await.map(Some),
            None => Ok(None),
        }
    }

    async fn process_claimed(
        &self,
        mut request: ScheduledAuditRequest,
    ) -> Result<ScheduledOutcome, OrchestratorError> {
        info!(request = %request.id, "scheduled audit claimed");

        match self
            .execute(request.scope.clone(), Some(request.id.clone()))
            .await
        {
            Ok(run) => {
                request.status = match run.status {
                    RunStatus::Completed => RequestStatus::Done,
                    _ => RequestStatus::Failed,
                };
                request.run_id = Some(run.id.clone());
                self.requests.update(&request)?;
                Ok(ScheduledOutcome {
                    request,
                    run: Some(run),
                })
            }
            Err(OrchestratorError::RunConflict { .. } | OrchestratorError::LockUnavailable(_)) => {
                warn!(request = %request.id, "scope lease unavailable, request failed");
                request.status = RequestStatus::Failed;
                self.requests.update(&request)?;
                Ok(ScheduledOutcome { request, run: None })
            }
            Err(err) => {
                request.status = RequestStatus::Failed;
                if let Err(update) = self.requests.update(&request) {
                    warn!(request = %request.id, error = %update, "request status not saved");
                }
                Err(err)
            }
        }
    }

    /// Process eligible requests until none remain.
    ///
    /// A request that errors is logged and skipped; it has already left the queue. A claim
    /// error ends the drain and is returned only when nothing was processed before it.
    pub async fn drain_scheduled(&self) -> Result<Vec<ScheduledOutcome>, OrchestratorError> {
        let mut outcomes = Vec::new();
        loop {
            let request = match self.claim_next() {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(err) if outcomes.is_empty() => return Err(err),
                Err(err) => {
                    warn!(error = %err, processed = outcomes.len(), "scheduled drain stopped");
                    break;
                }
            };
            let id = request.id.clone();
            match self.process_claimed(request).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => warn!(request = %id, error = %err, "scheduled audit skipped"),
            }
        }
        Ok(outcomes)
    }

    /// Operator recovery: put a claimed or failed request back in the queue.
    pub fn requeue(&self, id: &RequestId) -> Result<ScheduledAuditRequest, OrchestratorError> {
        let mut request = self.request(id)?;
        if !matches!(request.status, RequestStatus::Claimed | RequestStatus::Failed) {
            return Err(OrchestratorError::InvalidTransition {
                id: id.clone(),
                status: request.status.label(),
            });
        }
        request.status = RequestStatus::Queued;
        request.claimed_at = None;
        request.run_id = None;
        self.requests.update(&request)?;
        info!(request = %request.id, "audit request requeued");
        Ok(request)
    }

    pub fn run(&self, id: &AuditRunId) -> Result<AuditRun, OrchestratorError> {
        self.runs
            .fetch(id)?
            .ok_or_else(|| OrchestratorError::RunNotFound(id.clone()))
    }

    pub fn request(&self, id: &RequestId) -> Result<ScheduledAuditRequest, OrchestratorError> {
        self.requests
            .fetch(id)?
            .ok_or_else(|| OrchestratorError::RequestNotFound(id.clone()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("an overlapping audit run ({holder}) is already active")]
    RunConflict { holder: AuditRunId },
    #[error("scope lock unavailable: {0}")]
    LockUnavailable(String),
    #[error("audit run {0} not found")]
    RunNotFound(AuditRunId),
    #[error("audit request {0} not found")]
    RequestNotFound(RequestId),
    #[error("audit request {id} is {status} and cannot be requeued")]
    InvalidTransition { id: RequestId, status: &'static str },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
