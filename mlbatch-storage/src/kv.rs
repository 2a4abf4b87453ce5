//! Key-value store client contract

use async_trait::async_trait;
use mlbatch_config::StoreConfig;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

use crate::error::StorageResult;

/// Client of a key-value store shared by every process of a batch
///
/// Values live under a key and an optional subkey. Implementations must
/// tolerate concurrent access from many processes; a write is not required
/// to be visible to an immediately following read.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a string value
    async fn get_value(&self, key: &str, subkey: Option<&str>) -> StorageResult<Option<String>>;

    /// Set a string value, overwriting any previous one
    async fn set_value(&self, key: &str, subkey: Option<&str>, value: &str) -> StorageResult<()>;

    /// Remove a value; removing an absent value is not an error
    async fn delete_value(&self, key: &str, subkey: Option<&str>) -> StorageResult<()>;

    /// List the subkeys that currently hold a value under `key`
    async fn list_subkeys(&self, key: &str) -> StorageResult<Vec<String>>;

    /// Store a file by content, returning its `sha256://` location
    async fn save_file(&self, path: &Path) -> StorageResult<String>;

    /// Materialize a local path or store location as a local file
    ///
    /// Returns `None` when the artifact cannot be found.
    async fn realize_file(&self, path: &str) -> StorageResult<Option<PathBuf>>;

    /// Configuration that reopens this same store from another process
    ///
    /// `None` for stores that only exist inside this process.
    fn locator(&self) -> Option<StoreConfig>;

    /// Store a JSON object
    async fn save_object(
        &self,
        key: &str,
        subkey: Option<&str>,
        object: &JsonValue,
    ) -> StorageResult<()> {
        let text = serde_json::to_string(object)?;
        self.set_value(key, subkey, &text).await
    }

    /// Load a JSON object
    async fn load_object(&self, key: &str, subkey: Option<&str>) -> StorageResult<Option<JsonValue>> {
        match self.get_value(key, subkey).await? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }
}
