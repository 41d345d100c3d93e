//! Persistence seam for the two best-record scalars.

use std::{cell::RefCell, rc::Rc};

use arena_rush_core::BestRecord;

/// Errors reported by a [`BestRecordStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    /// The backing storage could not be read or written.
    #[error("best record storage failed: {0}")]
    Io(#[from] std::io::Error),
    /// The record could not be encoded for storage.
    #[error("failed to encode best records: {0}")]
    Encode(String),
}

/// Storage that survives process restarts for [`BestRecord`] values.
pub trait BestRecordStore {
    /// Loads the persisted record, falling back to zeroes when none exists.
    fn load(&self) -> BestRecord;

    /// Persists an improved record.
    fn save(&mut self, record: &BestRecord) -> Result<(), RecordStoreError>;
}

#[derive(Debug, Default)]
struct MemoryRecords {
    record: BestRecord,
    saves: u32,
}

/// In-process store; clones share the same storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryRecordStore {
    inner: Rc<RefCell<MemoryRecords>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with an existing record.
    #[must_use]
    pub fn with_record(record: BestRecord) -> Self {
        Self {
            inner: Rc::new(RefCell::new(MemoryRecords { record, saves: 0 })),
        }
    }

    /// Record currently held by the store.
    #[must_use]
    pub fn record(&self) -> BestRecord {
        self.inner.borrow().record
    }

    /// Number of times a record was written.
    #[must_use]
    pub fn save_count(&self) -> u32 {
        self.inner.borrow().saves
    }
}

impl BestRecordStore for MemoryRecordStore {
    fn load(&self) -> BestRecord {
        self.record()
    }

    fn save(&mut self, record: &BestRecord) -> Result<(), RecordStoreError> {
        let mut inner = self.inner.borrow_mut();
        inner.record = *record;
        inner.saves += 1;
        Ok(())
    }
}
