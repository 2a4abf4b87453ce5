//! Key-value store client contract and the status/result protocol
//!
//! The store is the only channel through which worker processes report
//! results back to the launching orchestrator, and it carries the halt
//! signal. Read-after-write consistency is not assumed: writes are read back
//! and retried, reads of expected results are retried with backoff.

pub mod error;
pub mod kv;
pub mod realize;
pub mod status;
pub mod stores;

pub use error::{StorageError, StorageResult};
pub use kv::KvStore;
pub use realize::RealizedFiles;
pub use status::StatusResultStore;
pub use stores::{file_digest, open_store, FileKvStore, InMemoryKvStore};

#[cfg(feature = "testing")]
pub use stores::testing::FlakyKvStore;
