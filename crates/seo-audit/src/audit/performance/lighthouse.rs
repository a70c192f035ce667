use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::audit::domain::{ContentUnitId, Finding, Severity};

const LOW_THRESHOLD: u8 = 90;
const CRITICAL_THRESHOLD: u8 = 50;
const CATEGORIES: [&str; 4] = ["performance", "accessibility", "best-practices", "seo"];

/// Category scores (0-100) and failed audits extracted from a Lighthouse result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceResult {
    pub scores: BTreeMap<String, u8>,
    pub failed_audits: Vec<FailedAudit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedAudit {
    pub id: String,
    pub title: String,
    pub description: String,
    pub display_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PageSpeedResponse {
    pub lighthouse_result: LighthouseResult,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct LighthouseResult {
    #[serde(default)]
    categories: BTreeMap<String, LighthouseCategory>,
    #[serde(default)]
    audits: BTreeMap<String, LighthouseAudit>,
}

#[derive(Debug, Deserialize)]
struct LighthouseCategory {
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LighthouseAudit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    score: Option<f64>,
    #[serde(default = "numeric_mode")]
    score_display_mode: String,
    display_value: Option<String>,
}

fn numeric_mode() -> String {
    "numeric".to_string()
}

impl LighthouseAudit {
    fn failed(&self) -> bool {
        match (self.score_display_mode.as_str(), self.score) {
            ("binary", Some(score)) => score < 1.0,
            ("numeric", Some(score)) => score < 0.9,
            _ => false,
        }
    }
}

impl From<LighthouseResult> for PerformanceResult {
    fn from(result: LighthouseResult) -> Self {
        let scores = result
            .categories
            .into_iter()
            .filter_map(|(id, category)| {
                category
                    .score
                    .map(|score| (id, (score.clamp(0.0, 1.0) * 100.0) as u8))
            })
            .collect();

        let failed_audits = result
            .audits
            .into_iter()
            .filter(|(_, audit)| audit.failed())
            .map(|(id, audit)| FailedAudit {
                id,
                title: audit.title,
                description: audit.description,
                display_value: audit.display_value,
            })
            .collect();

        Self {
            scores,
            failed_audits,
        }
    }
}

/// Deterministic result served in dry-run mode.
pub fn dry_run_result() -> PerformanceResult {
    let scores = [
        ("accessibility", 85),
        ("best-practices", 45),
        ("performance", 75),
        ("seo", 92),
    ]
    .into_iter()
    .map(|(id, score)| (id.to_string(), score))
    .collect();

    PerformanceResult {
        scores,
        failed_audits: vec![
            FailedAudit {
                id: "unused-css-rules".to_string(),
                title: "Remove unused CSS".to_string(),
                description: "Remove dead rules from stylesheets and defer the loading of CSS \
                              not used for above-the-fold content."
                    .to_string(),
                display_value: Some("Potential savings of 2.1 KiB".to_string()),
            },
            FailedAudit {
                id: "uses-text-compression".to_string(),
                title: "Enable text compression".to_string(),
                description: "Text-based resources should be served with compression (gzip, \
                              deflate or brotli) to minimize total network bytes."
                    .to_string(),
                display_value: None,
            },
        ],
    }
}

fn category_slug(id: &str) -> String {
    id.replace('-', "_")
}

fn category_title(id: &str) -> String {
    let mut title = String::with_capacity(id.len());
    let mut upper = true;
    for ch in id.chars() {
        if ch == '-' || ch == '_' {
            title.push(' ');
            upper = true;
        } else if upper {
            title.extend(ch.to_uppercase());
            upper = false;
        } else {
            title.push(ch);
        }
    }
    title
}

/// Turn a performance result into developer findings for `unit`.
pub fn findings_from_result(
    unit: &ContentUnitId,
    checker_name: &str,
    result: &PerformanceResult,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for category in CATEGORIES {
        let Some(&score) = result.scores.get(category) else {
            continue;
        };
        let slug = category_slug(category);
        let title = category_title(category);
        if score < CRITICAL_THRESHOLD {
            findings.push(Finding::new(
                unit,
                checker_name,
                format!("pagespeed_{slug}_score_critical"),
                Severity::High,
                format!("{title} score is critically low ({score}/100)."),
            ));
        } else if score < LOW_THRESHOLD {
            findings.push(Finding::new(
                unit,
                checker_name,
                format!("pagespeed_{slug}_score_low"),
                Severity::Medium,
                format!("{title} score is {score}/100."),
            ));
        }
    }

    for audit in &result.failed_audits {
        let mut message = format!("Lighthouse audit failed: {}.", audit.title);
        if let Some(display) = audit.display_value.as_deref().filter(|v| !v.is_empty()) {
            message.push(' ');
            message.push_str(display);
        }
        findings.push(Finding::new(
            unit,
            checker_name,
            format!("pagespeed_audit_{}", category_slug(&audit.id)),
            Severity::Medium,
            message,
        ));
    }

    findings.into_iter().map(Finding::for_developer).collect()
}
