//! Audit orchestration: checker pipeline, run lifecycle, scoring and run comparison.

pub mod checkers;
pub mod comparison;
pub mod content;
pub mod domain;
pub mod export;
pub mod lock;
pub mod memory;
pub mod orchestrator;
pub mod performance;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod repository;
pub mod router;
pub mod scoring;

#[cfg(test)]
mod tests;

pub use checkers::{
    standard_registry, MetaDescriptionChecker, TitleChecker, UnresolvedPlaceholderChecker,
};
pub use comparison::{
    compare, select_baseline, ComparisonError, ComparisonPolicy, ComparisonReport, ReportInterval,
};
pub use content::{AccessorError, ContentAccessor, StaticContent};
pub use domain::{
    AuditRun, AuditRunId, AuditRunSummary, ContentUnit, ContentUnitId, FieldValue, Finding,
    FindingKey, RequestId, RequestStatus, RunStatus, ScheduledAuditRequest, Scope, Severity,
    UnitType,
};
pub use lock::{InMemoryScopeLock, LockError, ScopeLock};
pub use memory::{InMemoryAuditRuns, InMemoryReports, InMemoryRequestQueue};
pub use orchestrator::{AuditOrchestrator, OrchestratorError, ScheduledOutcome};
pub use performance::{PerformanceApi, PerformanceError, RateLimitedClient};
pub use pipeline::{CheckerPipeline, PipelineOptions};
pub use registry::{Checker, CheckerError, CheckerRegistry, CheckerRole, UnknownUnitType};
pub use report::{
    NotifyError, ReportError, ReportNotification, ReportNotifier, ReportSettings, ReportingService,
};
pub use repository::{
    AuditRunRepository, Enqueued, ReportRepository, RepositoryError, RequestQueue,
};
pub use router::audit_router;
