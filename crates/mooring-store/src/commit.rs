//! # Commit Store Contract
//!
//! The anchoring engine only ever needs two operations on commit storage:
//! persist a record and get a reference back, or fetch a record by
//! reference. Hashing is done here, on canonical bytes, so every
//! implementation assigns identical references to identical records.

use std::collections::HashMap;

use async_trait::async_trait;
use mooring_core::{ContentRef, Record};
use parking_lot::RwLock;

use crate::error::StoreError;

/// Content-addressed record storage.
#[async_trait]
pub trait CommitStore: Send + Sync {
    /// Persist `record` and return its content reference.
    ///
    /// Storing the same record twice returns the same reference.
    async fn store(&self, record: &Record) -> Result<ContentRef, StoreError>;

    /// Fetch the record stored under `reference`.
    ///
    /// Fails with [`StoreError::NotFound`] if nothing is stored there.
    async fn retrieve(&self, reference: &ContentRef) -> Result<Record, StoreError>;
}

/// In-process commit store.
#[derive(Debug, Default)]
pub struct MemoryCommitStore {
    records: RwLock<HashMap<ContentRef, Record>>,
}

impl MemoryCommitStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// True if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// True if a record is stored under `reference`.
    pub fn contains(&self, reference: &ContentRef) -> bool {
        self.records.read().contains_key(reference)
    }
}

#[async_trait]
impl CommitStore for MemoryCommitStore {
    async fn store(&self, record: &Record) -> Result<ContentRef, StoreError> {
        let reference = record.content_ref()?;
        self.records
            .write()
            .entry(reference)
            .or_insert_with(|| record.clone());
        tracing::trace!(reference = %reference, kind = record.kind(), "stored record");
        Ok(reference)
    }

    async fn retrieve(&self, reference: &ContentRef) -> Result<Record, StoreError> {
        self.records
            .read()
            .get(reference)
            .cloned()
            .ok_or(StoreError::NotFound(*reference))
    }
}
