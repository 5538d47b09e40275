use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{KeyValueStore, KvEntry, SearchParams};
use crate::error::KvError;

/// In-process ordered key-value store.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &[u8]) -> Result<Vec<u8>, KvError> {
        match self.entries.read().get(key) {
            Some(value) => Ok(value.clone()),
            None => {
                tracing::trace!(key = %String::from_utf8_lossy(key), "key not found");
                Err(KvError::NotFound { key: key.to_vec() })
            }
        }
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn find(&self, params: &SearchParams) -> Result<Vec<KvEntry>, KvError> {
        let lower = match params.gt.as_deref() {
            Some(gt) => Bound::Excluded(gt),
            None => Bound::Unbounded,
        };
        let entries = self.entries.read();
        Ok(entries
            .range::<[u8], _>((lower, Bound::Unbounded))
            .take(params.limit.unwrap_or(usize::MAX))
            .map(|(key, value)| KvEntry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }
}
