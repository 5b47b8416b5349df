use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::domain::MatterId;

/// One mutex per matter so readiness/package passes for the same matter never interleave.
#[derive(Debug, Default)]
pub struct MatterLocks {
    inner: Mutex<HashMap<MatterId, Arc<Mutex<()>>>>,
}

impl MatterLocks {
    /// Entries no caller still holds are dropped here, so the map only tracks matters with a
    /// request in flight.
    pub fn lock_for(&self, matter_id: &MatterId) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|id, lock| id == matter_id || Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(matter_id.clone()).or_default())
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
