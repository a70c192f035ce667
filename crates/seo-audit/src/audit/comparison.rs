use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::domain::{AuditRun, AuditRunId, ContentUnitId, Finding, FindingKey, RunStatus};

/// Diff between a baseline run and a later run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub baseline_run_id: AuditRunId,
    pub current_run_id: AuditRunId,
    pub baseline_score: u8,
    pub current_score: u8,
    pub score_delta: i16,
    /// Sorted by severity (highest first), then category, then unit.
    pub new_issues: Vec<Finding>,
    pub fixed_issues: Vec<Finding>,
    pub new_unit_issue_count: usize,
    pub existing_unit_issue_count: usize,
    pub generated_at: DateTime<Utc>,
}

impl ComparisonReport {
    pub fn top_issues(&self, limit: usize) -> &[Finding] {
        &self.new_issues[..limit.min(self.new_issues.len())]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComparisonPolicy {
    /// Accept failed runs (with their partial findings) as input.
    pub allow_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComparisonError {
    #[error("run {run_id} is {status} and cannot be compared")]
    NotComparable {
        run_id: AuditRunId,
        status: &'static str,
    },
}

fn ensure_comparable(run: &AuditRun, policy: &ComparisonPolicy) -> Result<(), ComparisonError> {
    match run.status {
        RunStatus::Completed => Ok(()),
        RunStatus::Failed if policy.allow_failed => Ok(()),
        status => Err(ComparisonError::NotComparable {
            run_id: run.id.clone(),
            status: status.label(),
        }),
    }
}

pub fn issue_order(left: &Finding, right: &Finding) -> Ordering {
    right
        .severity
        .cmp(&left.severity)
        .then_with(|| left.category.cmp(&right.category))
        .then_with(|| left.content_unit_id.cmp(&right.content_unit_id))
        .then_with(|| left.checker_name.cmp(&right.checker_name))
}

fn keyed(findings: &[Finding]) -> BTreeMap<FindingKey, &Finding> {
    let mut keyed = BTreeMap::new();
    for finding in findings {
        keyed.entry(finding.key()).or_insert(finding);
    }
    keyed
}

pub fn compare(
    baseline: &AuditRun,
    current: &AuditRun,
    policy: &ComparisonPolicy,
) -> Result<ComparisonReport, ComparisonError> {
    compare_at(baseline, current, policy, Utc::now())
}

pub fn compare_at(
    baseline: &AuditRun,
    current: &AuditRun,
    policy: &ComparisonPolicy,
    generated_at: DateTime<Utc>,
) -> Result<ComparisonReport, ComparisonError> {
    ensure_comparable(baseline, policy)?;
    ensure_comparable(current, policy)?;

    let before = keyed(&baseline.findings);
    let after = keyed(&current.findings);

    let mut new_issues: Vec<Finding> = after
        .iter()
        .filter(|(key, _)| !before.contains_key(*key))
        .map(|(_, finding)| (*finding).clone())
        .collect();
    // Only units the current run audited can have an issue fixed.
    let current_units: BTreeSet<&ContentUnitId> = current.units_audited.iter().collect();
    let mut fixed_issues: Vec<Finding> = before
        .iter()
        .filter(|(key, _)| !after.contains_key(*key))
        .filter(|(_, finding)| current_units.contains(&finding.content_unit_id))
        .map(|(_, finding)| (*finding).clone())
        .collect();
    new_issues.sort_by(issue_order);
    fixed_issues.sort_by(issue_order);

    let baseline_units: BTreeSet<&ContentUnitId> = baseline.units_audited.iter().collect();
    let new_unit_issue_count = new_issues
        .iter()
        .filter(|finding| !baseline_units.contains(&finding.content_unit_id))
        .count();
    let existing_unit_issue_count = new_issues.len() - new_unit_issue_count;

    Ok(ComparisonReport {
        baseline_run_id: baseline.id.clone(),
        current_run_id: current.id.clone(),
        baseline_score: baseline.score,
        current_score: current.score,
        score_delta: i16::from(current.score) - i16::from(baseline.score),
        new_issues,
        fixed_issues,
        new_unit_issue_count,
        existing_unit_issue_count,
        generated_at,
    })
}

/// Minimum spacing between comparison reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportInterval {
    Days(u32),
    Weeks(u32),
    /// Thirty-day months.
    Months(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid report interval '{0}', expected forms like 7d, 2w or 1m")]
pub struct InvalidInterval(pub String);

fn interval_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d+)([dwm])$").ok())
        .as_ref()
}

impl ReportInterval {
    pub fn parse(raw: &str) -> Result<Self, InvalidInterval> {
        let normalized = raw.trim().to_ascii_lowercase();
        let invalid = || InvalidInterval(raw.to_string());
        let captures = interval_pattern()
            .and_then(|pattern| pattern.captures(&normalized))
            .ok_or_else(invalid)?;
        let value: u32 = captures[1].parse().map_err(|_| invalid())?;
        match &captures[2] {
            "d" => Ok(Self::Days(value)),
            "w" => Ok(Self::Weeks(value)),
            "m" => Ok(Self::Months(value)),
            _ => Err(invalid()),
        }
    }

    pub fn duration(&self) -> Duration {
        match *self {
            Self::Days(days) => Duration::days(i64::from(days)),
            Self::Weeks(weeks) => Duration::weeks(i64::from(weeks)),
            Self::Months(months) => Duration::days(i64::from(months) * 30),
        }
    }
}

impl Default for ReportInterval {
    fn default() -> Self {
        Self::Days(7)
    }
}

impl fmt::Display for ReportInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Days(n) => write!(f, "{n}d"),
            Self::Weeks(n) => write!(f, "{n}w"),
            Self::Months(n) => write!(f, "{n}m"),
        }
    }
}

/// Pick the run `current` should be compared against, if a report is due.
///
/// `completed` holds completed runs; `current` is ignored if present in it.
pub fn select_baseline<'a>(
    current: &AuditRun,
    last_report: Option<&ComparisonReport>,
    completed: &'a [AuditRun],
    interval: &ReportInterval,
) -> Option<&'a AuditRun> {
    let span = interval.duration();

    let newest_before_cutoff = || {
        completed
            .iter()
            .filter(|run| run.id != current.id && run.status == RunStatus::Completed)
            .filter(|run| run.created_at <= current.created_at - span)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
    };

    let Some(report) = last_report else {
        return newest_before_cutoff();
    };

    if current.created_at - report.generated_at < span {
        return None;
    }

    completed
        .iter()
        .find(|run| run.id == report.current_run_id && run.status == RunStatus::Completed)
        .or_else(newest_before_cutoff)
}
