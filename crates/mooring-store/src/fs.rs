//! # Filesystem Commit Store
//!
//! One canonical JSON file per record, named by its digest:
//! `<root>/<hex>.json`.
//!
//! ## Invariant
//!
//! Every record is re-hashed when it is read back. Content whose digest does
//! not match the requested reference is reported as
//! [`StoreError::Integrity`], never returned.
//!
//! Each write goes through its own temp file in the store directory and is
//! renamed into place, so concurrent stores of the same record never see
//! each other's partial bytes.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mooring_core::{ContentRef, Record};

use crate::commit::CommitStore;
use crate::error::StoreError;

/// A commit store backed by a directory.
#[derive(Debug, Clone)]
pub struct FsCommitStore {
    root: PathBuf,
}

impl FsCommitStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `reference`.
    pub fn record_path(&self, reference: &ContentRef) -> PathBuf {
        self.root.join(format!("{}.json", reference.to_hex()))
    }
}

#[async_trait]
impl CommitStore for FsCommitStore {
    async fn store(&self, record: &Record) -> Result<ContentRef, StoreError> {
        let canonical = record.canonical_bytes()?;
        let reference = ContentRef::of(&canonical);
        let path = self.record_path(&reference);

        if tokio::fs::try_exists(&path).await? {
            return Ok(reference);
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let root = self.root.clone();
        let dest = path.clone();
        let bytes = canonical.as_bytes().to_vec();
        tokio::task::spawn_blocking(move || persist_record(&root, &dest, &bytes))
            .await
            .map_err(std::io::Error::other)??;

        tracing::debug!(reference = %reference, kind = record.kind(), path = %path.display(), "stored record");
        Ok(reference)
    }

    async fn retrieve(&self, reference: &ContentRef) -> Result<Record, StoreError> {
        let path = self.record_path(reference);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(*reference));
            }
            Err(e) => {
                tracing::warn!(reference = %reference, path = %path.display(), "failed to read record: {e}");
                return Err(e.into());
            }
        };

        let record: Record = serde_json::from_slice(&bytes)?;
        let actual = record.content_ref()?;
        if actual != *reference {
            tracing::warn!(expected = %reference, actual = %actual, "stored record failed integrity check");
            return Err(StoreError::Integrity {
                expected: *reference,
                actual,
            });
        }
        Ok(record)
    }
}

/// Write `bytes` to a fresh temp file under `root` and rename it to `dest`.
///
/// Losing a rename race to another writer of the same record is success:
/// the content is identical.
fn persist_record(root: &Path, dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".record-")
        .suffix(".tmp")
        .tempfile_in(root)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    match tmp.persist(dest) {
        Ok(_) => Ok(()),
        Err(e) if dest.exists() => {
            tracing::debug!(path = %dest.display(), "record already persisted by another writer: {}", e.error);
            Ok(())
        }
        Err(e) => Err(e.error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn store_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::new(dir.path().join("records"));
        let record = Record::plain(Some(2), serde_json::json!({"k": "v"}));
        let r = store.store(&record).await.unwrap();

        let path = store.record_path(&r);
        assert!(path.exists());
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), format!("{}.json", r.to_hex()));
        assert_eq!(store.retrieve(&r).await.unwrap(), record);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::new(dir.path());
        let r = Record::plain(None, serde_json::json!({})).content_ref().unwrap();
        assert!(store.retrieve(&r).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn tampered_file_fails_integrity() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::new(dir.path());
        let original = Record::plain(Some(1), serde_json::json!({}));
        let r = store.store(&original).await.unwrap();

        let forged = Record::plain(Some(99), serde_json::json!({}));
        std::fs::write(store.record_path(&r), serde_json::to_vec(&forged).unwrap()).unwrap();

        match store.retrieve(&r).await {
            Err(StoreError::Integrity { expected, actual }) => {
                assert_eq!(expected, r);
                assert_eq!(actual, forged.content_ref().unwrap());
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::new(dir.path());
        let r = store
            .store(&Record::plain(None, serde_json::json!({})))
            .await
            .unwrap();
        std::fs::write(store.record_path(&r), b"not json").unwrap();
        assert!(matches!(
            store.retrieve(&r).await,
            Err(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn second_store_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::new(dir.path());
        let record = Record::plain(Some(1), serde_json::json!({"a": 1}));
        store.store(&record).await.unwrap();
        store.store(&record).await.unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_stores_of_one_record_all_succeed() {
        const WRITERS: usize = 8;
        const ROUNDS: usize = 20;

        let blob = "x".repeat(200 * 1024);
        for round in 0..ROUNDS {
            let dir = tempfile::tempdir().unwrap();
            let store = Arc::new(FsCommitStore::new(dir.path()));
            let record = Record::plain(Some(round as u64), serde_json::json!({ "blob": blob }));
            let expected = record.content_ref().unwrap();

            let writers: Vec<_> = (0..WRITERS)
                .map(|_| {
                    let store = Arc::clone(&store);
                    let record = record.clone();
                    tokio::spawn(async move { store.store(&record).await })
                })
                .collect();
            for writer in writers {
                let stored = writer.await.unwrap();
                assert_eq!(stored.unwrap(), expected, "round {round}");
            }

            assert_eq!(store.retrieve(&expected).await.unwrap(), record);
            let names: Vec<_> = std::fs::read_dir(dir.path())
                .unwrap()
                .map(|e| e.unwrap().file_name())
                .collect();
            assert_eq!(names.len(), 1, "round {round}: leftover files {names:?}");
        }
    }
}
