//! In-process stores backing the CLI, the service binary and the tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::comparison::ComparisonReport;
use super::domain::{
    AuditRun, AuditRunId, Finding, RequestId, RequestStatus, RunStatus, ScheduledAuditRequest,
};
use super::repository::{
    AuditRunRepository, Enqueued, ReportRepository, RepositoryError, RequestQueue,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
}

#[derive(Default, Clone)]
pub struct InMemoryAuditRuns {
    runs: Arc<Mutex<HashMap<AuditRunId, AuditRun>>>,
}

impl InMemoryAuditRuns {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditRunRepository for InMemoryAuditRuns {
    fn insert(&self, run: AuditRun) -> Result<AuditRun, RepositoryError> {
        let mut guard = lock(&self.runs)?;
        if guard.contains_key(&run.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(run.id.clone(), run.clone());
        Ok(run)
    }

    fn update(&self, run: &AuditRun) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.runs)?;
        match guard.get_mut(&run.id) {
            Some(stored) => {
                *stored = run.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn append_findings(
        &self,
        id: &AuditRunId,
        findings: &[Finding],
    ) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.runs)?;
        let stored = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        stored.findings.extend_from_slice(findings);
        Ok(())
    }

    fn fetch(&self, id: &AuditRunId) -> Result<Option<AuditRun>, RepositoryError> {
        Ok(lock(&self.runs)?.get(id).cloned())
    }

    fn completed(&self, limit: usize) -> Result<Vec<AuditRun>, RepositoryError> {
        let guard = lock(&self.runs)?;
        let mut runs: Vec<AuditRun> = guard
            .values()
            .filter(|run| run.status == RunStatus::Completed)
            .cloned()
            .collect();
        runs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        runs.truncate(limit);
        Ok(runs)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryRequestQueue {
    requests: Arc<Mutex<Vec<ScheduledAuditRequest>>>,
}

impl InMemoryRequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self) -> Result<usize, RepositoryError> {
        Ok(lock(&self.requests)?
            .iter()
            .filter(|request| request.status == RequestStatus::Queued)
            .count())
    }
}

impl RequestQueue for InMemoryRequestQueue {
    fn enqueue(&self, candidate: ScheduledAuditRequest) -> Result<Enqueued, RepositoryError> {
        let mut guard = lock(&self.requests)?;
        let scope = candidate.scope.normalized();
        if let Some(existing) = guard.iter().find(|request| {
            request.status == RequestStatus::Queued && request.scope.normalized() == scope
        }) {
            return Ok(Enqueued {
                request: existing.clone(),
                coalesced: true,
            });
        }
        if guard.iter().any(|request| request.id == candidate.id) {
            return Err(RepositoryError::Conflict);
        }

        let request = ScheduledAuditRequest {
            scope,
            ..candidate
        };
        guard.push(request.clone());
        Ok(Enqueued {
            request,
            coalesced: false,
        })
    }

    fn claim_next(
        &self,
        eligible: &dyn Fn(&ScheduledAuditRequest) -> bool,
        claimed_at: DateTime<Utc>,
    ) -> Result<Option<ScheduledAuditRequest>, RepositoryError> {
        let mut guard = lock(&self.requests)?;
        // Oldest eligible request; a blocked head does not stall the rest of the queue.
        let next = guard
            .iter_mut()
            .filter(|request| request.status == RequestStatus::Queued && eligible(&**request))
            .min_by_key(|request| request.requested_at);

        Ok(next.map(|request| {
            request.status = RequestStatus::Claimed;
            request.claimed_at = Some(claimed_at);
            request.clone()
        }))
    }

    fn update(&self, request: &ScheduledAuditRequest) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.requests)?;
        let stored = guard
            .iter_mut()
            .find(|stored| stored.id == request.id)
            .ok_or(RepositoryError::NotFound)?;
        *stored = request.clone();
        Ok(())
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<ScheduledAuditRequest>, RepositoryError> {
        Ok(lock(&self.requests)?
            .iter()
            .find(|request| &request.id == id)
            .cloned())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryReports {
    reports: Arc<Mutex<Vec<ComparisonReport>>>,
}

impl InMemoryReports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Result<Vec<ComparisonReport>, RepositoryError> {
        Ok(lock(&self.reports)?.clone())
    }
}

impl ReportRepository for InMemoryReports {
    fn insert(&self, report: ComparisonReport) -> Result<(), RepositoryError> {
        lock(&self.reports)?.push(report);
        Ok(())
    }

    fn latest(&self) -> Result<Option<ComparisonReport>, RepositoryError> {
        Ok(lock(&self.reports)?.last().cloned())
    }
}
