use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::domain::{ContentUnit, Finding, UnitType};

/// How the pipeline schedules a checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerRole {
    /// Pure function of the unit's fields.
    Content,
    /// Backed by the external performance API; eligible for per-type propagation.
    Performance,
}

/// Strategy producing findings for one content unit.
#[async_trait]
pub trait Checker: Send + Sync {
    fn name(&self) -> &str;

    fn role(&self) -> CheckerRole {
        CheckerRole::Content
    }

    async fn evaluate(&self, unit: &ContentUnit) -> Result<Vec<Finding>, CheckerError>;
}

/// Failure raised by a checker strategy; the pipeline converts it into a finding.
#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    #[error("checker could not read field '{0}'")]
    Field(String),
    #[error("checker failed: {0}")]
    Execution(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no checkers registered for unit type '{0}'")]
pub struct UnknownUnitType(pub UnitType);

/// Lookup table from unit type to checkers, kept in registration order.
#[derive(Default, Clone)]
pub struct CheckerRegistry {
    by_type: BTreeMap<UnitType, Vec<Arc<dyn Checker>>>,
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, unit_type: UnitType, checker: Arc<dyn Checker>) -> &mut Self {
        self.by_type.entry(unit_type).or_default().push(checker);
        self
    }

    pub fn register_for<I>(&mut self, unit_types: I, checker: Arc<dyn Checker>) -> &mut Self
    where
        I: IntoIterator<Item = UnitType>,
    {
        for unit_type in unit_types {
            self.register(unit_type, checker.clone());
        }
        self
    }

    pub fn applicable_checkers(
        &self,
        unit_type: &UnitType,
    ) -> Result<&[Arc<dyn Checker>], UnknownUnitType> {
        self.by_type
            .get(unit_type)
            .map(Vec::as_slice)
            .filter(|checkers| !checkers.is_empty())
            .ok_or_else(|| UnknownUnitType(unit_type.clone()))
    }

    /// Checker identifiers for a type, in the order they run.
    pub fn checker_names(&self, unit_type: &UnitType) -> Result<Vec<String>, UnknownUnitType> {
        Ok(self
            .applicable_checkers(unit_type)?
            .iter()
            .map(|checker| checker.name().to_string())
            .collect())
    }

    pub fn performance_checker(&self, unit_type: &UnitType) -> Option<Arc<dyn Checker>> {
        self.by_type.get(unit_type).and_then(|checkers| {
            checkers
                .iter()
                .find(|checker| checker.role() == CheckerRole::Performance)
                .cloned()
        })
    }

    pub fn unit_types(&self) -> impl Iterator<Item = &UnitType> {
        self.by_type.keys()
    }
}
