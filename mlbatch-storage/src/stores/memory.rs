//! Process-local key-value store

use async_trait::async_trait;
use mlbatch_config::StoreConfig;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{hex_digest, parse_store_url};
use crate::error::StorageResult;
use crate::kv::KvStore;

#[derive(Default)]
struct Entries {
    values: HashMap<String, String>,
    subkeys: HashMap<String, BTreeMap<String, String>>,
    files: HashMap<String, PathBuf>,
}

/// In-memory store for sequential and pool execution and for tests
///
/// Clones share the same contents. Saved files are remembered by path, not
/// copied.
#[derive(Clone, Default)]
pub struct InMemoryKvStore {
    entries: Arc<RwLock<Entries>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get_value(&self, key: &str, subkey: Option<&str>) -> StorageResult<Option<String>> {
        let entries = self.entries.read();
        Ok(match subkey {
            None => entries.values.get(key).cloned(),
            Some(subkey) => entries
                .subkeys
                .get(key)
                .and_then(|values| values.get(subkey))
                .cloned(),
        })
    }

    async fn set_value(&self, key: &str, subkey: Option<&str>, value: &str) -> StorageResult<()> {
        let mut entries = self.entries.write();
        match subkey {
            None => {
                entries.values.insert(key.to_string(), value.to_string());
            }
            Some(subkey) => {
                entries
                    .subkeys
                    .entry(key.to_string())
                    .or_default()
                    .insert(subkey.to_string(), value.to_string());
            }
        }
        Ok(())
    }

    async fn delete_value(&self, key: &str, subkey: Option<&str>) -> StorageResult<()> {
        let mut entries = self.entries.write();
        match subkey {
            None => {
                entries.values.remove(key);
            }
            Some(subkey) => {
                if let Some(values) = entries.subkeys.get_mut(key) {
                    values.remove(subkey);
                }
            }
        }
        Ok(())
    }

    async fn list_subkeys(&self, key: &str) -> StorageResult<Vec<String>> {
        let entries = self.entries.read();
        Ok(entries
            .subkeys
            .get(key)
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn save_file(&self, path: &Path) -> StorageResult<String> {
        let contents = tokio::fs::read(path).await?;
        let hash = hex_digest(&contents);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        self.entries
            .write()
            .files
            .insert(hash.clone(), path.to_path_buf());

        Ok(format!("{}{}/{}", mlbatch_core::STORE_URL_PREFIX, hash, name))
    }

    async fn realize_file(&self, path: &str) -> StorageResult<Option<PathBuf>> {
        let local = match parse_store_url(path) {
            Some(hash) => match self.entries.read().files.get(hash) {
                Some(local) => local.clone(),
                None => return Ok(None),
            },
            None => PathBuf::from(path),
        };

        Ok(tokio::fs::metadata(&local)
            .await
            .ok()
            .filter(|meta| meta.is_file())
            .map(|_| local))
    }

    fn locator(&self) -> Option<StoreConfig> {
        None
    }
}
