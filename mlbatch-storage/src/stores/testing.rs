//! Store wrapper that simulates eventual consistency

use async_trait::async_trait;
use mlbatch_config::StoreConfig;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::StorageResult;
use crate::kv::KvStore;

/// Wraps a store and hides values from the next `n` reads
///
/// Writes pass through untouched, so a value becomes visible once the
/// configured number of misses has been served.
pub struct FlakyKvStore {
    inner: Arc<dyn KvStore>,
    misses_left: AtomicU32,
    reads: AtomicU32,
}

impl FlakyKvStore {
    pub fn new(inner: Arc<dyn KvStore>, misses: u32) -> Self {
        Self {
            inner,
            misses_left: AtomicU32::new(misses),
            reads: AtomicU32::new(0),
        }
    }

    /// Make the next `misses` reads come back empty
    pub fn miss_next(&self, misses: u32) {
        self.misses_left.store(misses, Ordering::SeqCst);
    }

    /// Total reads served
    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KvStore for FlakyKvStore {
    async fn get_value(&self, key: &str, subkey: Option<&str>) -> StorageResult<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let missed = self
            .misses_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if missed {
            return Ok(None);
        }
        self.inner.get_value(key, subkey).await
    }

    async fn set_value(&self, key: &str, subkey: Option<&str>, value: &str) -> StorageResult<()> {
        self.inner.set_value(key, subkey, value).await
    }

    async fn delete_value(&self, key: &str, subkey: Option<&str>) -> StorageResult<()> {
        self.inner.delete_value(key, subkey).await
    }

    async fn list_subkeys(&self, key: &str) -> StorageResult<Vec<String>> {
        self.inner.list_subkeys(key).await
    }

    async fn save_file(&self, path: &Path) -> StorageResult<String> {
        self.inner.save_file(path).await
    }

    async fn realize_file(&self, path: &str) -> StorageResult<Option<PathBuf>> {
        self.inner.realize_file(path).await
    }

    fn locator(&self) -> Option<StoreConfig> {
        self.inner.locator()
    }
}
