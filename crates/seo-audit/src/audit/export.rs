use std::io::Write;
use std::path::Path;

use serde::Serialize;

use super::domain::{AuditRun, Finding};

#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io(err) => write!(f, "failed to write findings export: {}", err),
            ExportError::Csv(err) => write!(f, "could not encode findings as CSV: {}", err),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(err) => Some(err),
            ExportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Serialize)]
struct FindingRow<'a> {
    #[serde(rename = "Run")]
    run_id: &'a str,
    #[serde(rename = "Unit")]
    unit_id: &'a str,
    #[serde(rename = "Checker")]
    checker: &'a str,
    #[serde(rename = "Category")]
    category: &'a str,
    #[serde(rename = "Severity")]
    severity: &'static str,
    #[serde(rename = "Developer")]
    requires_developer: bool,
    #[serde(rename = "Message")]
    message: &'a str,
}

impl<'a> FindingRow<'a> {
    fn new(run: &'a AuditRun, finding: &'a Finding) -> Self {
        Self {
            run_id: &run.id.0,
            unit_id: &finding.content_unit_id.0,
            checker: &finding.checker_name,
            category: &finding.category,
            severity: finding.severity.label(),
            requires_developer: finding.requires_developer,
            message: &finding.message,
        }
    }
}

/// Write one CSV row per finding, in stored order, after a header row.
pub fn write_findings<W: Write>(run: &AuditRun, writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for finding in &run.findings {
        csv_writer.serialize(FindingRow::new(run, finding))?;
    }
    if run.findings.is_empty() {
        csv_writer.write_record([
            "Run",
            "Unit",
            "Checker",
            "Category",
            "Severity",
            "Developer",
            "Message",
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn export_to_path<P: AsRef<Path>>(run: &AuditRun, path: P) -> Result<(), ExportError> {
    let file = std::fs::File::create(path)?;
    write_findings(run, file)
}
