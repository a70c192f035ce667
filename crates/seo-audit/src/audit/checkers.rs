//! Metadata checkers shipped with the engine and the standard registry wiring.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::placeholder::{PlaceholderError, Template};

use super::domain::{ContentUnit, Finding, Severity, UnitType};
use super::performance::{PerformanceChecker, RateLimitedClient};
use super::registry::{Checker, CheckerError, CheckerRegistry};

pub const TITLE_MIN_LENGTH: usize = 50;
pub const TITLE_MAX_LENGTH: usize = 60;
pub const META_DESC_MIN_LENGTH: usize = 120;
pub const META_DESC_MAX_LENGTH: usize = 160;

const METADATA_FIELDS: [&str; 2] = ["seo_title", "search_description"];

/// Length bounds for one metadata field.
struct LengthRule {
    checker: &'static str,
    prefix: &'static str,
    label: &'static str,
    missing: Severity,
    min: usize,
    max: usize,
}

impl LengthRule {
    fn evaluate(&self, unit: &ContentUnit, text: Option<&str>) -> Vec<Finding> {
        let text = text.map(str::trim).unwrap_or_default();
        let length = text.chars().count();
        let (suffix, severity, message) = if length == 0 {
            ("missing", self.missing, format!("{} is missing.", self.label))
        } else if length < self.min {
            (
                "too_short",
                Severity::Medium,
                format!(
                    "{} is too short ({length} chars). Recommended: {}-{} characters.",
                    self.label, self.min, self.max
                ),
            )
        } else if length > self.max {
            (
                "too_long",
                Severity::Medium,
                format!(
                    "{} is too long ({length} chars). Recommended: {}-{} characters.",
                    self.label, self.min, self.max
                ),
            )
        } else {
            return Vec::new();
        };

        vec![Finding::new(
            &unit.id,
            self.checker,
            format!("{}_{suffix}", self.prefix),
            severity,
            message,
        )]
    }
}

/// Title length; `seo_title` wins over the page `title`.
pub struct TitleChecker;

#[async_trait]
impl Checker for TitleChecker {
    fn name(&self) -> &str {
        "title"
    }

    async fn evaluate(&self, unit: &ContentUnit) -> Result<Vec<Finding>, CheckerError> {
        let title = unit
            .text_field("seo_title")
            .filter(|value| !value.trim().is_empty())
            .or_else(|| unit.text_field("title"));
        let rule = LengthRule {
            checker: "title",
            prefix: "title",
            label: "Title",
            missing: Severity::High,
            min: TITLE_MIN_LENGTH,
            max: TITLE_MAX_LENGTH,
        };
        Ok(rule.evaluate(unit, title))
    }
}

pub struct MetaDescriptionChecker;

#[async_trait]
impl Checker for MetaDescriptionChecker {
    fn name(&self) -> &str {
        "meta_description"
    }

    async fn evaluate(&self, unit: &ContentUnit) -> Result<Vec<Finding>, CheckerError> {
        let rule = LengthRule {
            checker: "meta_description",
            prefix: "meta_description",
            label: "Meta description",
            missing: Severity::Medium,
            min: META_DESC_MIN_LENGTH,
            max: META_DESC_MAX_LENGTH,
        };
        Ok(rule.evaluate(unit, unit.text_field("search_description")))
    }
}

/// Flags metadata that still carries template tokens.
pub struct UnresolvedPlaceholderChecker;

#[async_trait]
impl Checker for UnresolvedPlaceholderChecker {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn evaluate(&self, unit: &ContentUnit) -> Result<Vec<Finding>, CheckerError> {
        let mut found = BTreeSet::new();
        for field in METADATA_FIELDS {
            let Some(text) = unit.text_field(field) else {
                continue;
            };
            match Template::parse(text) {
                Ok(template) => {
                    found.extend(template.tokens().map(|token| format!("{field}: {}", token.raw)));
                }
                Err(PlaceholderError::InvalidSyntax { fragment, .. }) => {
                    found.insert(format!("{field}: {fragment}"));
                }
            }
        }

        if found.is_empty() {
            return Ok(Vec::new());
        }
        let listed: Vec<String> = found.into_iter().collect();
        Ok(vec![Finding::new(
            &unit.id,
            "placeholder",
            "placeholder_unprocessed",
            Severity::High,
            format!(
                "SEO metadata contains unprocessed placeholders ({}).",
                listed.join(", ")
            ),
        )])
    }
}

/// Registry with the metadata checkers for every type, plus the performance checker when a
/// client is available. Performance runs last so its findings follow the content findings.
pub fn standard_registry<I>(
    unit_types: I,
    performance: Option<Arc<RateLimitedClient>>,
) -> CheckerRegistry
where
    I: IntoIterator<Item = UnitType>,
{
    let unit_types: Vec<UnitType> = unit_types.into_iter().collect();
    let mut registry = CheckerRegistry::new();
    registry
        .register_for(unit_types.iter().cloned(), Arc::new(TitleChecker))
        .register_for(unit_types.iter().cloned(), Arc::new(MetaDescriptionChecker))
        .register_for(
            unit_types.iter().cloned(),
            Arc::new(UnresolvedPlaceholderChecker),
        );
    if let Some(client) = performance {
        registry.register_for(unit_types, Arc::new(PerformanceChecker::new(client)));
    }
    registry
}
