use std::sync::Arc;

use async_trait::async_trait;

use super::domain::{ContentUnit, ContentUnitId, Scope};

/// Read-only view over the content store.
#[async_trait]
pub trait ContentAccessor: Send + Sync {
    /// Units in scope, in the store's stable order. Unknown ids in a subset are skipped.
    async fn list_units(&self, scope: &Scope) -> Result<Vec<ContentUnit>, AccessorError>;
    async fn get_unit(&self, id: &ContentUnitId) -> Result<Option<ContentUnit>, AccessorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AccessorError {
    #[error("content store unreachable: {0}")]
    Unreachable(String),
    #[error("content store returned malformed data: {0}")]
    Malformed(String),
}

/// Fixed content tree held in memory.
#[derive(Debug, Default, Clone)]
pub struct StaticContent {
    units: Arc<Vec<ContentUnit>>,
}

impl StaticContent {
    pub fn new(units: Vec<ContentUnit>) -> Self {
        Self {
            units: Arc::new(units),
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[async_trait]
impl ContentAccessor for StaticContent {
    async fn list_units(&self, scope: &Scope) -> Result<Vec<ContentUnit>, AccessorError> {
        Ok(self
            .units
            .iter()
            .filter(|unit| scope.contains(&unit.id))
            .cloned()
            .collect())
    }

    async fn get_unit(&self, id: &ContentUnitId) -> Result<Option<ContentUnit>, AccessorError> {
        Ok(self.units.iter().find(|unit| &unit.id == id).cloned())
    }
}
