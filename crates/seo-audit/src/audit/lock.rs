use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::domain::{AuditRunId, Scope};

/// Exclusivity lease keyed by scope overlap.
pub trait ScopeLock: Send + Sync {
    /// Take a lease for `run`; fails when another lease overlaps `scope`.
    fn try_acquire(&self, run: &AuditRunId, scope: &Scope) -> Result<(), LockError>;
    fn release(&self, run: &AuditRunId);
    fn is_contended(&self, scope: &Scope) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("scope is held by run {holder}")]
    Conflict { holder: AuditRunId },
    #[error("lock unavailable: {0}")]
    Unavailable(String),
}

#[derive(Default)]
pub struct InMemoryScopeLock {
    leases: Mutex<BTreeMap<AuditRunId, Scope>>,
}

impl InMemoryScopeLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held(&self) -> usize {
        self.leases.lock().map(|leases| leases.len()).unwrap_or(0)
    }
}

impl ScopeLock for InMemoryScopeLock {
    fn try_acquire(&self, run: &AuditRunId, scope: &Scope) -> Result<(), LockError> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|_| LockError::Unavailable("lease table poisoned".to_string()))?;

        if let Some((holder, _)) = leases
            .iter()
            .find(|(holder, held)| *holder != run && held.overlaps(scope))
        {
            return Err(LockError::Conflict {
                holder: holder.clone(),
            });
        }

        leases.insert(run.clone(), scope.clone());
        Ok(())
    }

    fn release(&self, run: &AuditRunId) {
        if let Ok(mut leases) = self.leases.lock() {
            leases.remove(run);
        }
    }

    fn is_contended(&self, scope: &Scope) -> bool {
        self.leases
            .lock()
            .map(|leases| leases.values().any(|held| held.overlaps(scope)))
            .unwrap_or(true)
    }
}

/// Held lease; released when dropped.
pub struct ScopeLease {
    lock: Arc<dyn ScopeLock>,
    run: AuditRunId,
}

impl ScopeLease {
    pub fn acquire(
        lock: Arc<dyn ScopeLock>,
        run: &AuditRunId,
        scope: &Scope,
    ) -> Result<Self, LockError> {
        lock.try_acquire(run, scope)?;
        Ok(Self {
            lock,
            run: run.clone(),
        })
    }
}

impl Drop for ScopeLease {
    fn drop(&mut self) {
        self.lock.release(&self.run);
    }
}
