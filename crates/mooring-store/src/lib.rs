//! # mooring-store — Store Contracts
//!
//! Two collaborator contracts the anchoring engine talks to:
//!
//! - **[`CommitStore`]**: put/get of content-addressed [`Record`]s. The
//!   reference for a record is always its canonical SHA-256, so stores never
//!   assign identifiers themselves. [`MemoryCommitStore`] for tests and
//!   local nodes, [`FsCommitStore`] for one-file-per-record persistence.
//!
//! - **[`KeyValueStore`]**: ordered byte-string keys for checkpoint and
//!   document state. An absent key is reported as [`KvError::NotFound`], a
//!   normal control-flow signal that callers match on rather than a fault.
//!
//! Both traits are object-safe (`async-trait`) so the engine can hold them
//! as `Arc<dyn ...>`.
//!
//! [`Record`]: mooring_core::Record

pub mod commit;
pub mod error;
pub mod fs;
pub mod kv;

pub use commit::{CommitStore, MemoryCommitStore};
pub use error::{KvError, StoreError};
pub use fs::FsCommitStore;
pub use kv::{KeyValueStore, KvEntry, KvStoreExt, MemoryKvStore, SearchParams};
