use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use seo_audit::audit::{
    standard_registry, AccessorError, AuditOrchestrator, CheckerPipeline, ContentUnit,
    ContentUnitId, InMemoryAuditRuns, InMemoryReports, InMemoryRequestQueue, InMemoryScopeLock,
    NotifyError, PipelineOptions, RateLimitedClient, ReportNotification, ReportNotifier,
    ReportSettings, ReportingService, Scope, ScopeLock, StaticContent, UnitType,
};
use seo_audit::config::AppConfig;
use seo_audit::error::AppError;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type ServiceOrchestrator =
    AuditOrchestrator<StaticContent, InMemoryAuditRuns, InMemoryRequestQueue>;
pub(crate) type ServiceReporting = ReportingService<InMemoryAuditRuns, InMemoryReports>;

/// Orchestrator and reporting service sharing one run store.
pub(crate) struct AuditServices {
    pub(crate) orchestrator: Arc<ServiceOrchestrator>,
    pub(crate) reporting: Arc<ServiceReporting>,
}

/// Wire the audit engine over a fixed content tree. Checkers are registered for every unit
/// type present in `units`.
pub(crate) fn build_services(
    config: &AppConfig,
    units: Vec<ContentUnit>,
) -> Result<AuditServices, AppError> {
    let unit_types = unit_types(&units);
    let performance = RateLimitedClient::from_config(&config.performance)?.map(Arc::new);
    info!(
        unit_types = unit_types.len(),
        units = units.len(),
        performance = performance.is_some(),
        "audit engine configured"
    );

    let registry = Arc::new(standard_registry(unit_types, performance));
    let pipeline = Arc::new(CheckerPipeline::new(
        registry,
        PipelineOptions::from_config(config),
    ));
    let runs = Arc::new(InMemoryAuditRuns::new());
    let lock: Arc<dyn ScopeLock> = Arc::new(InMemoryScopeLock::new());
    let orchestrator = Arc::new(AuditOrchestrator::new(
        Arc::new(StaticContent::new(units)),
        runs.clone(),
        Arc::new(InMemoryRequestQueue::new()),
        lock,
        pipeline,
    ));
    let reporting = Arc::new(ReportingService::new(
        runs,
        Arc::new(InMemoryReports::new()),
        Arc::new(TracingNotifier),
        ReportSettings::from_config(&config.reporting),
    ));

    Ok(AuditServices {
        orchestrator,
        reporting,
    })
}

/// Distinct unit types in first-seen order.
pub(crate) fn unit_types(units: &[ContentUnit]) -> Vec<UnitType> {
    let mut seen: Vec<UnitType> = Vec::new();
    for unit in units {
        if !seen.contains(&unit.unit_type) {
            seen.push(unit.unit_type.clone());
        }
    }
    seen
}

/// Content tree exported as a JSON array of units.
pub(crate) fn load_content(path: &Path) -> Result<Vec<ContentUnit>, AccessorError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| AccessorError::Unreachable(format!("{}: {err}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|err| AccessorError::Malformed(format!("{}: {err}", path.display())))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|err| AppError::Io(std::io::Error::from(err)))
}

pub(crate) fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let raw = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::Io(std::io::Error::from(err)))?;
    std::fs::write(path, raw)?;
    Ok(())
}

/// No ids means the whole site.
pub(crate) fn scope_from_ids(ids: &[String]) -> Scope {
    if ids.is_empty() {
        Scope::All
    } else {
        Scope::units(ids.iter().map(|id| ContentUnitId(id.trim().to_string())))
    }
}

/// `all` or a comma separated list of unit ids.
pub(crate) fn parse_scope(raw: &str) -> Result<Scope, String> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("all") {
        return Ok(Scope::All);
    }
    let ids: Vec<String> = trimmed
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err(format!("'{raw}' names no content units"));
    }
    Ok(scope_from_ids(&ids))
}

pub(crate) fn parse_pair(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing name in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Writes reports to the log stream; stands in for the mail relay.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingNotifier;

impl ReportNotifier for TracingNotifier {
    fn deliver(&self, notification: &ReportNotification) -> Result<(), NotifyError> {
        if notification.recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }
        info!(
            subject = %notification.subject,
            recipients = %notification.recipients.join(", "),
            new_issues = notification.report.new_issues.len(),
            fixed_issues = notification.report.fixed_issues.len(),
            "seo report delivered"
        );
        for finding in &notification.top_findings {
            info!(
                unit = %finding.content_unit_id,
                severity = finding.severity.label(),
                category = %finding.category,
                "{}",
                finding.message
            );
        }
        Ok(())
    }
}
