//! In-process record log. Used when no database is configured and in tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use warden_core::errors::PersistenceError;
use warden_core::traits::{PersistedRecord, PersistedState, Persistence, RetentionPolicy};

use crate::retention::retained;

#[derive(Debug, Default)]
pub struct MemoryPersistence {
    records: Mutex<Vec<PersistedRecord>>,
    unavailable: AtomicBool,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `Unavailable` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<PersistedRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable {
                reason: "memory backend marked unavailable".into(),
            });
        }
        Ok(())
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self) -> Result<PersistedState, PersistenceError> {
        self.check()?;
        Ok(PersistedState::replay(self.records()))
    }

    fn append(&self, record: &PersistedRecord) -> Result<(), PersistenceError> {
        self.check()?;
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }

    fn append_batch(&self, records: &[PersistedRecord]) -> Result<(), PersistenceError> {
        self.check()?;
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(records);
        Ok(())
    }

    fn compact(&self, policy: &RetentionPolicy) -> Result<usize, PersistenceError> {
        self.check()?;
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let keep = retained(&records, policy, Utc::now());
        let before = records.len();
        let mut mask = keep.into_iter();
        records.retain(|_| mask.next().unwrap_or(true));
        Ok(before - records.len())
    }
}
