//! # Ordered Key-Value Store Contract
//!
//! Byte-string keys in lexicographic order. Used for persisted checkpoint and
//! document state, separately from the commit store.
//!
//! `get` on an absent key returns [`KvError::NotFound`]. That is an expected
//! answer, so implementations log it at `trace` at most; any other failure
//! is logged at `warn` with the offending key.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::KvError;

mod memory;

pub use memory::MemoryKvStore;

/// Range and size bounds for [`KeyValueStore::find`] and
/// [`KeyValueStore::find_keys`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    /// Only keys strictly greater than this bound.
    pub gt: Option<Vec<u8>>,
    /// At most this many results.
    pub limit: Option<usize>,
}

impl SearchParams {
    /// No bound, no limit.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to keys strictly greater than `key`.
    pub fn gt(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.gt = Some(key.into());
        self
    }

    /// Return at most `limit` results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True if `key` satisfies the lower bound.
    pub fn admits(&self, key: &[u8]) -> bool {
        self.gt.as_deref().map_or(true, |gt| key > gt)
    }
}

/// One key/value pair returned by [`KeyValueStore::find`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    /// The key.
    pub key: Vec<u8>,
    /// The stored value.
    pub value: Vec<u8>,
}

/// Ordered byte-string key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, or [`KvError::NotFound`].
    async fn get(&self, key: &[u8]) -> Result<Vec<u8>, KvError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &[u8]) -> Result<(), KvError>;

    /// Entries matching `params`, in ascending key order.
    async fn find(&self, params: &SearchParams) -> Result<Vec<KvEntry>, KvError>;

    /// True if a value is stored under `key`.
    async fn exists(&self, key: &[u8]) -> Result<bool, KvError> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(log_failure(key, e)),
        }
    }

    /// Keys of the entries [`KeyValueStore::find`] would return for `params`.
    async fn find_keys(&self, params: &SearchParams) -> Result<Vec<Vec<u8>>, KvError> {
        Ok(self
            .find(params)
            .await?
            .into_iter()
            .map(|entry| entry.key)
            .collect())
    }

    /// True if no key satisfies the bound in `params`.
    async fn is_empty(&self, params: &SearchParams) -> Result<bool, KvError> {
        let probe = SearchParams {
            gt: params.gt.clone(),
            limit: Some(1),
        };
        Ok(self.find_keys(&probe).await?.is_empty())
    }
}

/// JSON-typed access on top of any [`KeyValueStore`].
#[async_trait]
pub trait KvStoreExt: KeyValueStore {
    /// Decode the JSON value stored under `key`.
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &[u8]) -> Result<T, KvError> {
        let bytes = self.get(key).await.map_err(|e| log_failure(key, e))?;
        serde_json::from_slice(&bytes).map_err(|source| {
            tracing::warn!(key = %String::from_utf8_lossy(key), "stored value failed to decode: {source}");
            KvError::Serialization {
                key: key.to_vec(),
                source,
            }
        })
    }

    /// Encode `value` as JSON and store it under `key`.
    async fn put_json<T: Serialize + Sync>(&self, key: &[u8], value: &T) -> Result<(), KvError> {
        let bytes = serde_json::to_vec(value).map_err(|source| KvError::Serialization {
            key: key.to_vec(),
            source,
        })?;
        self.put(key, &bytes).await
    }
}

impl<S: KeyValueStore + ?Sized> KvStoreExt for S {}

/// Log `error` at `warn` with its key unless it is a plain miss.
fn log_failure(key: &[u8], error: KvError) -> KvError {
    if !error.is_not_found() {
        tracing::warn!(key = %String::from_utf8_lossy(key), "key-value store failed: {error}");
    }
    error
}
