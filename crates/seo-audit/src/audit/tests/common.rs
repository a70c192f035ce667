use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::audit::checkers::standard_registry;
use crate::audit::content::{AccessorError, ContentAccessor, StaticContent};
use crate::audit::domain::{
    AuditRun, AuditRunId, ContentUnit, ContentUnitId, FieldValue, Finding, Scope, UnitType,
};
use crate::audit::lock::{InMemoryScopeLock, ScopeLock};
use crate::audit::memory::{InMemoryAuditRuns, InMemoryRequestQueue};
use crate::audit::orchestrator::AuditOrchestrator;
use crate::audit::performance::{
    dry_run_result, ClientLimits, PerformanceApi, PerformanceError, PerformanceResult,
    RateLimitedClient, RetryPolicy,
};
use crate::audit::pipeline::{CheckerPipeline, PipelineOptions};
use crate::audit::registry::{Checker, CheckerError, CheckerRegistry};
use crate::audit::report::{NotifyError, ReportNotification, ReportNotifier};
use crate::audit::repository::{AuditRunRepository, RepositoryError};

pub(super) const GOOD_TITLE: &str = "Artisan sourdough and rye, baked fresh every morning";
pub(super) const GOOD_DESCRIPTION: &str = "Visit our neighbourhood bakery for sourdough, rye and \
     seasonal pastries, baked before sunrise and sold until the shelves are empty each day.";

pub(super) fn unit_id(id: &str) -> ContentUnitId {
    ContentUnitId(id.to_string())
}

pub(super) fn page(id: &str, unit_type: &str, fields: &[(&str, &str)]) -> ContentUnit {
    ContentUnit {
        id: unit_id(id),
        unit_type: UnitType::new(unit_type),
        url: Some(format!("https://bakery.example/{id}/")),
        fields: fields
            .iter()
            .map(|(name, value)| (name.to_string(), FieldValue::Text(value.to_string())))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Page with a title and description inside the recommended bounds.
pub(super) fn healthy_page(id: &str, unit_type: &str) -> ContentUnit {
    page(
        id,
        unit_type,
        &[("title", GOOD_TITLE), ("search_description", GOOD_DESCRIPTION)],
    )
}

/// Page missing both title and description: one high and one medium finding.
pub(super) fn bare_page(id: &str, unit_type: &str) -> ContentUnit {
    page(id, unit_type, &[])
}

pub(super) fn categories(findings: &[Finding]) -> Vec<&str> {
    findings.iter().map(|finding| finding.category.as_str()).collect()
}

/// Dry-run transport that counts calls.
#[derive(Default)]
pub(super) struct CountingApi {
    pub(super) calls: AtomicUsize,
}

impl CountingApi {
    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PerformanceApi for CountingApi {
    async fn run(&self, _url: &str) -> Result<PerformanceResult, PerformanceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(dry_run_result())
    }
}

pub(super) fn counting_client(api: Arc<CountingApi>) -> Arc<RateLimitedClient> {
    let limits = ClientLimits {
        max_in_flight: 2,
        min_spacing: Duration::ZERO,
        request_timeout: Duration::from_secs(5),
        retry: RetryPolicy::default(),
    };
    Arc::new(RateLimitedClient::new(api, limits))
}

pub(super) struct FailingChecker;

#[async_trait]
impl Checker for FailingChecker {
    fn name(&self) -> &str {
        "schema"
    }

    async fn evaluate(&self, _unit: &ContentUnit) -> Result<Vec<Finding>, CheckerError> {
        Err(CheckerError::Field("schema_markup".to_string()))
    }
}

pub(super) struct PanickingChecker;

#[async_trait]
impl Checker for PanickingChecker {
    fn name(&self) -> &str {
        "links"
    }

    async fn evaluate(&self, _unit: &ContentUnit) -> Result<Vec<Finding>, CheckerError> {
        panic!("link graph exploded")
    }
}

/// Content accessor that blocks `list_units` until the test opens the gate.
pub(super) struct GatedContent {
    inner: StaticContent,
    gate: Semaphore,
}

impl GatedContent {
    pub(super) fn new(units: Vec<ContentUnit>) -> Self {
        Self {
            inner: StaticContent::new(units),
            gate: Semaphore::new(0),
        }
    }

    pub(super) fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

#[async_trait]
impl ContentAccessor for GatedContent {
    async fn list_units(&self, scope: &Scope) -> Result<Vec<ContentUnit>, AccessorError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|err| AccessorError::Unreachable(err.to_string()))?;
        self.inner.list_units(scope).await
    }

    async fn get_unit(&self, id: &ContentUnitId) -> Result<Option<ContentUnit>, AccessorError> {
        self.inner.get_unit(id).await
    }
}

pub(super) struct UnreachableContent;

#[async_trait]
impl ContentAccessor for UnreachableContent {
    async fn list_units(&self, _scope: &Scope) -> Result<Vec<ContentUnit>, AccessorError> {
        Err(AccessorError::Unreachable("connection refused".to_string()))
    }

    async fn get_unit(&self, _id: &ContentUnitId) -> Result<Option<ContentUnit>, AccessorError> {
        Err(AccessorError::Unreachable("connection refused".to_string()))
    }
}

/// Run store whose `append_findings` starts failing after `healthy_appends` calls.
pub(super) struct FlakyRuns {
    inner: InMemoryAuditRuns,
    healthy_appends: usize,
    appends: AtomicUsize,
    failing_insert: Option<usize>,
    inserts: AtomicUsize,
    failing_update: Option<usize>,
    updates: AtomicUsize,
}

impl FlakyRuns {
    pub(super) fn new(healthy_appends: usize) -> Self {
        Self {
            inner: InMemoryAuditRuns::new(),
            healthy_appends,
            appends: AtomicUsize::new(0),
            failing_insert: None,
            inserts: AtomicUsize::new(0),
            failing_update: None,
            updates: AtomicUsize::new(0),
        }
    }

    /// Fail only the insert with this zero-based call index.
    pub(super) fn failing_insert(mut self, call: usize) -> Self {
        self.failing_insert = Some(call);
        self
    }

    /// Fail only the update with this zero-based call index.
    pub(super) fn failing_update(mut self, call: usize) -> Self {
        self.failing_update = Some(call);
        self
    }
}

impl AuditRunRepository for FlakyRuns {
    fn insert(&self, run: AuditRun) -> Result<AuditRun, RepositoryError> {
        let call = self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.failing_insert == Some(call) {
            return Err(RepositoryError::Unavailable("down".to_string()));
        }
        self.inner.insert(run)
    }

    fn update(&self, run: &AuditRun) -> Result<(), RepositoryError> {
        let call = self.updates.fetch_add(1, Ordering::SeqCst);
        if self.failing_update == Some(call) {
            return Err(RepositoryError::Unavailable("down".to_string()));
        }
        self.inner.update(run)
    }

    fn append_findings(
        &self,
        id: &AuditRunId,
        findings: &[Finding],
    ) -> Result<(), RepositoryError> {
        if self.appends.fetch_add(1, Ordering::SeqCst) >= self.healthy_appends {
            return Err(RepositoryError::Unavailable("disk full".to_string()));
        }
        self.inner.append_findings(id, findings)
    }

    fn fetch(&self, id: &AuditRunId) -> Result<Option<AuditRun>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn completed(&self, limit: usize) -> Result<Vec<AuditRun>, RepositoryError> {
        self.inner.completed(limit)
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    pub(super) delivered: Mutex<Vec<ReportNotification>>,
}

impl ReportNotifier for MemoryNotifier {
    fn deliver(&self, notification: &ReportNotification) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .map_err(|_| NotifyError::Delivery("notifier poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}

pub(super) fn content_registry(unit_types: &[&str]) -> Arc<CheckerRegistry> {
    Arc::new(standard_registry(
        unit_types.iter().map(|name| UnitType::new(*name)),
        None,
    ))
}

pub(super) type MemoryOrchestrator<C> =
    AuditOrchestrator<C, InMemoryAuditRuns, InMemoryRequestQueue>;

pub(super) struct Harness<C> {
    pub(super) orchestrator: Arc<MemoryOrchestrator<C>>,
    pub(super) runs: Arc<InMemoryAuditRuns>,
    pub(super) queue: Arc<InMemoryRequestQueue>,
    pub(super) lock: Arc<InMemoryScopeLock>,
}

pub(super) fn harness<C>(content: Arc<C>, registry: Arc<CheckerRegistry>) -> Harness<C>
where
    C: ContentAccessor + 'static,
{
    let runs = Arc::new(InMemoryAuditRuns::new());
    let queue = Arc::new(InMemoryRequestQueue::new());
    let lock = Arc::new(InMemoryScopeLock::new());
    let scope_lock: Arc<dyn ScopeLock> = lock.clone();
    let pipeline = Arc::new(CheckerPipeline::new(registry, PipelineOptions::default()));
    let orchestrator = Arc::new(AuditOrchestrator::new(
        content,
        runs.clone(),
        queue.clone(),
        scope_lock,
        pipeline,
    ));
    Harness {
        orchestrator,
        runs,
        queue,
        lock,
    }
}

pub(super) fn bakery_site() -> Vec<ContentUnit> {
    vec![
        healthy_page("home", "home_page"),
        bare_page("about", "standard_page"),
        healthy_page("menu", "standard_page"),
    ]
}

pub(super) fn bakery_harness() -> Harness<StaticContent> {
    harness(
        Arc::new(StaticContent::new(bakery_site())),
        content_registry(&["home_page", "standard_page"]),
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
