use chrono::{DateTime, Utc};
use serde::Serialize;

use super::comparison::ComparisonReport;
use super::domain::{AuditRun, AuditRunId, Finding, RequestId, ScheduledAuditRequest};

/// Storage for audit runs and their findings.
pub trait AuditRunRepository: Send + Sync {
    /// Fails with [`RepositoryError::Conflict`] when the id is already taken.
    fn insert(&self, run: AuditRun) -> Result<AuditRun, RepositoryError>;
    fn update(&self, run: &AuditRun) -> Result<(), RepositoryError>;
    /// Findings are kept in append order.
    fn append_findings(&self, id: &AuditRunId, findings: &[Finding])
        -> Result<(), RepositoryError>;
    fn fetch(&self, id: &AuditRunId) -> Result<Option<AuditRun>, RepositoryError>;
    /// Completed runs, newest first.
    fn completed(&self, limit: usize) -> Result<Vec<AuditRun>, RepositoryError>;
}

/// Outcome of a scheduling trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enqueued {
    pub request: ScheduledAuditRequest,
    /// True when an identical queued request absorbed this one.
    pub coalesced: bool,
}

/// Queue of scheduled audit requests.
pub trait RequestQueue: Send + Sync {
    /// Store `candidate` unless a queued request has the same normalized scope.
    fn enqueue(&self, candidate: ScheduledAuditRequest) -> Result<Enqueued, RepositoryError>;
    /// Oldest queued request accepted by `eligible`, marked claimed in the same step.
    fn claim_next(
        &self,
        eligible: &dyn Fn(&ScheduledAuditRequest) -> bool,
        claimed_at: DateTime<Utc>,
    ) -> Result<Option<ScheduledAuditRequest>, RepositoryError>;
    fn update(&self, request: &ScheduledAuditRequest) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &RequestId) -> Result<Option<ScheduledAuditRequest>, RepositoryError>;
}

/// Persisted comparison reports.
pub trait ReportRepository: Send + Sync {
    fn insert(&self, report: ComparisonReport) -> Result<(), RepositoryError>;
    fn latest(&self) -> Result<Option<ComparisonReport>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
