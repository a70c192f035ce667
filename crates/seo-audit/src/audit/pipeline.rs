use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use futures::FutureExt;
use tracing::{debug, warn};

use crate::config::AppConfig;

use super::domain::{ContentUnit, ContentUnitId, Finding, Severity, UnitType};
use super::registry::{Checker, CheckerRegistry, CheckerRole};

pub const CHECKER_ERROR_CATEGORY: &str = "checker_error";

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Units evaluated concurrently.
    pub workers: usize,
    /// Run the performance checker once per unit type and share its findings.
    pub per_type_performance: bool,
    /// When false, developer findings are dropped and the performance checker is skipped.
    pub include_developer_findings: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            workers: config.audit.workers,
            per_type_performance: config.performance.per_unit_type,
            include_developer_findings: config.audit.include_developer_fixes,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            per_type_performance: false,
            include_developer_findings: true,
        }
    }
}

/// Findings collected for one unit, in checker registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFindings {
    pub unit_id: ContentUnitId,
    pub findings: Vec<Finding>,
}

/// Performance findings of each type's representative unit.
#[derive(Debug, Default)]
pub struct PerformanceCache {
    by_type: HashMap<UnitType, Vec<Finding>>,
}

impl PerformanceCache {
    pub fn for_type(&self, unit_type: &UnitType) -> Option<&[Finding]> {
        self.by_type.get(unit_type).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

pub struct CheckerPipeline {
    registry: Arc<CheckerRegistry>,
    options: PipelineOptions,
}

impl CheckerPipeline {
    pub fn new(registry: Arc<CheckerRegistry>, options: PipelineOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Evaluate representatives (first unit of each type) when per-type mode is on.
    pub async fn prepare(&self, units: &[ContentUnit]) -> PerformanceCache {
        let mut cache = PerformanceCache::default();
        if !self.options.per_type_performance || !self.options.include_developer_findings {
            return cache;
        }

        // First unit of each type that has a URL, else the first unit of that type.
        let mut representatives: Vec<(&ContentUnit, Arc<dyn Checker>)> = Vec::new();
        for unit in units {
            match representatives
                .iter_mut()
                .find(|(seen, _)| seen.unit_type == unit.unit_type)
            {
                Some(entry) if entry.0.url.is_none() && unit.url.is_some() => entry.0 = unit,
                Some(_) => {}
                None => {
                    if let Some(checker) = self.registry.performance_checker(&unit.unit_type) {
                        representatives.push((unit, checker));
                    }
                }
            }
        }

        let evaluations = representatives.into_iter().map(|(unit, checker)| async move {
            debug!(unit = %unit.id, unit_type = %unit.unit_type, "performance representative");
            let findings = evaluate_isolated(checker.as_ref(), unit).await;
            (unit.unit_type.clone(), findings)
        });
        cache.by_type = futures::future::join_all(evaluations)
            .await
            .into_iter()
            .collect();
        cache
    }

    pub async fn evaluate_unit(
        &self,
        unit: &ContentUnit,
        cache: &PerformanceCache,
    ) -> UnitFindings {
        let checkers = match self.registry.applicable_checkers(&unit.unit_type) {
            Ok(checkers) => checkers,
            Err(err) => {
                debug!(unit = %unit.id, error = %err, "skipping unit");
                return UnitFindings {
                    unit_id: unit.id.clone(),
                    findings: Vec::new(),
                };
            }
        };

        let mut findings = Vec::new();
        for checker in checkers {
            if checker.role() == CheckerRole::Performance {
                if !self.options.include_developer_findings {
                    continue;
                }
                if let Some(shared) = cache.for_type(&unit.unit_type) {
                    findings.extend(shared.iter().map(|finding| finding.reassigned_to(&unit.id)));
                    continue;
                }
            }
            findings.extend(evaluate_isolated(checker.as_ref(), unit).await);
        }

        if !self.options.include_developer_findings {
            findings.retain(|finding| {
                !finding.requires_developer || finding.category == CHECKER_ERROR_CATEGORY
            });
        }

        UnitFindings {
            unit_id: unit.id.clone(),
            findings,
        }
    }

    /// Findings per unit as they complete; cross-unit order is unspecified.
    pub fn stream<'a>(
        &'a self,
        units: Vec<ContentUnit>,
        cache: &'a PerformanceCache,
    ) -> impl Stream<Item = UnitFindings> + 'a {
        stream::iter(units)
            .map(move |unit| async move { self.evaluate_unit(&unit, cache).await })
            .buffer_unordered(self.options.workers.max(1))
    }

    pub async fn run(&self, units: Vec<ContentUnit>) -> Vec<UnitFindings> {
        let cache = self.prepare(&units).await;
        self.stream(units, &cache).collect().await
    }
}

/// Errors and panics become one synthetic high finding for the unit/checker pair.
async fn evaluate_isolated(checker: &dyn Checker, unit: &ContentUnit) -> Vec<Finding> {
    match AssertUnwindSafe(checker.evaluate(unit)).catch_unwind().await {
        Ok(Ok(findings)) => findings,
        Ok(Err(err)) => {
            warn!(unit = %unit.id, checker = checker.name(), error = %err, "checker failed");
            vec![checker_error(unit, checker.name(), &err.to_string())]
        }
        Err(payload) => {
            let reason = panic_reason(payload.as_ref());
            warn!(unit = %unit.id, checker = checker.name(), %reason, "checker panicked");
            vec![checker_error(unit, checker.name(), &reason)]
        }
    }
}

fn checker_error(unit: &ContentUnit, checker: &str, reason: &str) -> Finding {
    Finding::new(
        &unit.id,
        checker,
        CHECKER_ERROR_CATEGORY,
        Severity::High,
        format!("Checker '{checker}' failed: {reason}"),
    )
    .for_developer()
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
