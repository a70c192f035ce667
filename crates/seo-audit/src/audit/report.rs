use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ReportingConfig;

use super::comparison::{
    compare, select_baseline, ComparisonError, ComparisonPolicy, ComparisonReport,
    ReportInterval,
};
use super::domain::{AuditRun, Finding, RunStatus};
use super::repository::{AuditRunRepository, ReportRepository, RepositoryError};

/// Completed runs considered when looking for a baseline.
const BASELINE_HISTORY: usize = 500;

/// Payload handed to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportNotification {
    pub subject: String,
    pub recipients: Vec<String>,
    pub report: ComparisonReport,
    pub top_findings: Vec<Finding>,
}

impl ReportNotification {
    pub fn new(report: ComparisonReport, top_n: usize, recipients: Vec<String>) -> Self {
        Self {
            subject: subject_for(report.score_delta),
            recipients,
            top_findings: report.top_issues(top_n).to_vec(),
            report,
        }
    }
}

pub fn subject_for(score_delta: i16) -> String {
    match score_delta {
        delta if delta > 0 => format!("SEO Score Improved: +{delta} points"),
        delta if delta < 0 => format!("SEO Score Declined: {delta} points"),
        _ => "SEO Audit Report - No Score Change".to_string(),
    }
}

/// Delivers comparison reports (email, chat, ...).
pub trait ReportNotifier: Send + Sync {
    fn deliver(&self, notification: &ReportNotification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("no recipients configured")]
    NoRecipients,
    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Comparison(#[from] ComparisonError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub interval: ReportInterval,
    pub top_n: usize,
    pub recipients: Vec<String>,
}

impl ReportSettings {
    pub fn from_config(config: &ReportingConfig) -> Self {
        Self {
            interval: config.interval,
            top_n: config.top_n,
            recipients: config.recipients.clone(),
        }
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            interval: ReportInterval::default(),
            top_n: 20,
            recipients: Vec::new(),
        }
    }
}

/// Turns completed runs into periodic comparison reports.
pub struct ReportingService<R, P> {
    runs: Arc<R>,
    reports: Arc<P>,
    notifier: Arc<dyn ReportNotifier>,
    settings: ReportSettings,
}

impl<R, P> ReportingService<R, P>
where
    R: AuditRunRepository + 'static,
    P: ReportRepository + 'static,
{
    pub fn new(
        runs: Arc<R>,
        reports: Arc<P>,
        notifier: Arc<dyn ReportNotifier>,
        settings: ReportSettings,
    ) -> Self {
        Self {
            runs,
            reports,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Compare `current` against its baseline when a report is due. Returns the delivered
    /// notification, or `None` when no report was produced.
    ///
    /// A persisted report stays persisted when delivery fails; the failure is logged.
    pub fn process(&self, current: &AuditRun) -> Result<Option<ReportNotification>, ReportError> {
        if current.status != RunStatus::Completed {
            debug!(run = %current.id, status = current.status.label(), "run not reportable");
            return Ok(None);
        }

        let last_report = self.reports.latest()?;
        let history = self.runs.completed(BASELINE_HISTORY)?;
        let Some(baseline) = select_baseline(
            current,
            last_report.as_ref(),
            &history,
            &self.settings.interval,
        ) else {
            debug!(run = %current.id, interval = %self.settings.interval, "no report due");
            return Ok(None);
        };

        let report = compare(baseline, current, &ComparisonPolicy::default())?;
        self.reports.insert(report.clone())?;
        info!(
            baseline = %report.baseline_run_id,
            current = %report.current_run_id,
            delta = report.score_delta,
            new_issues = report.new_issues.len(),
            fixed_issues = report.fixed_issues.len(),
            "comparison report generated"
        );

        let notification = ReportNotification::new(
            report,
            self.settings.top_n,
            self.settings.recipients.clone(),
        );
        if let Err(err) = self.notifier.deliver(&notification) {
            warn!(error = %err, subject = %notification.subject, "report delivery failed");
        }
        Ok(Some(notification))
    }
}
