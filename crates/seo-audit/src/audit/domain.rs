use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier assigned to a content unit by the content store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentUnitId(pub String);

impl fmt::Display for ContentUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content type tag (e.g. `blog_page`) used to select checkers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitType(pub String);

impl UnitType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed field value supplied by the content store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    RichText(String),
    Number(i64),
    Flag(bool),
}

/// Read-only view of a page or snippet handed to the checkers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    pub id: ContentUnitId,
    pub unit_type: UnitType,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl ContentUnit {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Text of a `Text` or `RichText` field; other kinds are not textual.
    pub fn text_field(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::Text(value)) | Some(FieldValue::RichText(value)) => {
                Some(value.as_str())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// Single detected defect. Identity for diffing is `(unit, checker, category)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub content_unit_id: ContentUnitId,
    pub checker_name: String,
    pub category: String,
    pub severity: Severity,
    pub message: String,
    pub requires_developer: bool,
}

impl Finding {
    pub fn new(
        unit: &ContentUnitId,
        checker_name: &str,
        category: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            content_unit_id: unit.clone(),
            checker_name: checker_name.to_string(),
            category: category.into(),
            severity,
            message: message.into(),
            requires_developer: false,
        }
    }

    pub fn for_developer(mut self) -> Self {
        self.requires_developer = true;
        self
    }

    pub fn key(&self) -> FindingKey {
        FindingKey {
            content_unit_id: self.content_unit_id.clone(),
            checker_name: self.checker_name.clone(),
            category: self.category.clone(),
        }
    }

    /// Copy of the finding attributed to another unit.
    pub fn reassigned_to(&self, unit: &ContentUnitId) -> Self {
        Self {
            content_unit_id: unit.clone(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FindingKey {
    pub content_unit_id: ContentUnitId,
    pub checker_name: String,
    pub category: String,
}

/// Set of content units targeted by a run or request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "units", rename_all = "snake_case")]
pub enum Scope {
    All,
    Single(ContentUnitId),
    Subset(BTreeSet<ContentUnitId>),
}

impl Scope {
    /// Build a unit scope; a single id collapses to `Single` so identical scopes compare equal.
    pub fn units<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = ContentUnitId>,
    {
        let mut ids: BTreeSet<ContentUnitId> = ids.into_iter().collect();
        if ids.len() == 1 {
            if let Some(id) = ids.pop_first() {
                return Scope::Single(id);
            }
        }
        Scope::Subset(ids)
    }

    pub fn normalized(&self) -> Self {
        match self {
            Scope::Subset(ids) => Scope::units(ids.iter().cloned()),
            other => other.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Scope::Subset(ids) if ids.is_empty())
    }

    pub fn contains(&self, id: &ContentUnitId) -> bool {
        match self {
            Scope::All => true,
            Scope::Single(single) => single == id,
            Scope::Subset(ids) => ids.contains(id),
        }
    }

    /// Two scopes overlap when some unit could be audited by both.
    pub fn overlaps(&self, other: &Scope) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        match (self, other) {
            (Scope::All, _) | (_, Scope::All) => true,
            (Scope::Single(id), scope) | (scope, Scope::Single(id)) => scope.contains(id),
            (Scope::Subset(left), Scope::Subset(right)) => !left.is_disjoint(right),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Scope::All => "all".to_string(),
            Scope::Single(id) => format!("unit {id}"),
            Scope::Subset(ids) => format!("{} units", ids.len()),
        }
    }
}

/// Identifier for an audit run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditRunId(pub String);

impl fmt::Display for AuditRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Scored snapshot of one pipeline execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRun {
    pub id: AuditRunId,
    pub scope: Scope,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub units_audited: Vec<ContentUnitId>,
    pub findings: Vec<Finding>,
    pub score: u8,
    pub failure_reason: Option<String>,
    pub request_id: Option<RequestId>,
}

impl AuditRun {
    pub fn pending(id: AuditRunId, scope: Scope, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            scope,
            status: RunStatus::Pending,
            created_at,
            started_at: None,
            completed_at: None,
            units_audited: Vec::new(),
            findings: Vec::new(),
            score: 0,
            failure_reason: None,
            request_id: None,
        }
    }

    pub fn severity_count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|finding| finding.severity == severity)
            .count()
    }

    pub fn summary(&self) -> AuditRunSummary {
        AuditRunSummary {
            run_id: self.id.clone(),
            status: self.status.label(),
            scope: self.scope.label(),
            score: self.score,
            units_audited: self.units_audited.len(),
            total_findings: self.findings.len(),
            high: self.severity_count(Severity::High),
            medium: self.severity_count(Severity::Medium),
            low: self.severity_count(Severity::Low),
            failure_reason: self.failure_reason.clone(),
        }
    }
}

/// Flattened run view for CLI and HTTP responses.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRunSummary {
    pub run_id: AuditRunId,
    pub status: &'static str,
    pub scope: String,
    pub score: u8,
    pub units_audited: usize,
    pub total_findings: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Queued,
    Claimed,
    Done,
    Failed,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Queued => "queued",
            RequestStatus::Claimed => "claimed",
            RequestStatus::Done => "done",
            RequestStatus::Failed => "failed",
        }
    }
}

/// Audit queued by an external trigger and consumed by the periodic runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAuditRequest {
    pub id: RequestId,
    pub scope: Scope,
    pub requested_at: DateTime<Utc>,
    pub status: RequestStatus,
    pub claimed_at: Option<DateTime<Utc>>,
    pub run_id: Option<AuditRunId>,
}
