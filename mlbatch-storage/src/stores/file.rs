//! Directory-backed key-value store
//!
//! Every key maps to a file under `values/`, named by the SHA-256 of the key
//! and fanned out over two directory levels. Subkeys live in a sibling
//! `<hash>.dir/` directory, one file per subkey. Writes go to a temporary
//! file that is renamed into place, so readers never observe a torn value.
//! File contents are kept under `blobs/<sha256>`.

use async_trait::async_trait;
use mlbatch_config::StoreConfig;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use super::{hex_digest, parse_store_url};
use crate::error::{StorageError, StorageResult};
use crate::kv::KvStore;

const SUBKEY_SUFFIX: &str = ".txt";

/// Key-value store shared through a filesystem directory
#[derive(Debug, Clone)]
pub struct FileKvStore {
    root: PathBuf,
    config: StoreConfig,
}

impl FileKvStore {
    /// Open (creating if needed) the database rooted at `root`
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("values"))?;
        std::fs::create_dir_all(root.join("blobs"))?;
        let config = StoreConfig::file(&root);
        Ok(Self { root, config })
    }

    /// Root directory of the database
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Carry retry settings along with the locator
    pub(crate) fn set_config(&mut self, config: StoreConfig) {
        self.config = config;
    }

    fn key_base(&self, key: &str) -> PathBuf {
        let hash = hex_digest(key.as_bytes());
        self.root
            .join("values")
            .join(&hash[0..2])
            .join(&hash[2..4])
            .join(hash)
    }

    fn subkey_dir(&self, key: &str) -> PathBuf {
        let mut base = self.key_base(key).into_os_string();
        base.push(".dir");
        PathBuf::from(base)
    }

    fn value_path(&self, key: &str, subkey: Option<&str>) -> StorageResult<PathBuf> {
        match subkey {
            None => Ok(self.key_base(key)),
            Some(subkey) => {
                validate_subkey(subkey)?;
                Ok(self
                    .subkey_dir(key)
                    .join(format!("{}{}", subkey, SUBKEY_SUFFIX)))
            }
        }
    }

    fn blob_path(&self, hash: &str) -> PathBuf {
        self.root.join("blobs").join(hash)
    }
}

fn validate_subkey(subkey: &str) -> StorageResult<()> {
    let valid = !subkey.is_empty()
        && !subkey.starts_with('.')
        && subkey
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(subkey.to_string()))
    }
}

/// Write `contents` to `path` through a uniquely named temporary sibling
async fn write_atomic(path: &Path, contents: &[u8]) -> StorageResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| StorageError::InvalidKey(path.display().to_string()))?;
    tokio::fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{}.tmp-{}", file_name, Uuid::new_v4()));

    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get_value(&self, key: &str, subkey: Option<&str>) -> StorageResult<Option<String>> {
        let path = self.value_path(key, subkey)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_value(&self, key: &str, subkey: Option<&str>, value: &str) -> StorageResult<()> {
        let path = self.value_path(key, subkey)?;
        write_atomic(&path, value.as_bytes()).await
    }

    async fn delete_value(&self, key: &str, subkey: Option<&str>) -> StorageResult<()> {
        let path = self.value_path(key, subkey)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_subkeys(&self, key: &str) -> StorageResult<Vec<String>> {
        let dir = self.subkey_dir(key);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut subkeys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if let Some(subkey) = name.strip_suffix(SUBKEY_SUFFIX) {
                subkeys.push(subkey.to_string());
            }
        }
        subkeys.sort();
        Ok(subkeys)
    }

    async fn save_file(&self, path: &Path) -> StorageResult<String> {
        let contents = tokio::fs::read(path).await?;
        let hash = hex_digest(&contents);
        let blob = self.blob_path(&hash);

        if tokio::fs::metadata(&blob).await.is_err() {
            write_atomic(&blob, &contents).await?;
            debug!("Stored {} as blob {}", path.display(), hash);
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        Ok(format!("{}{}/{}", mlbatch_core::STORE_URL_PREFIX, hash, name))
    }

    async fn realize_file(&self, path: &str) -> StorageResult<Option<PathBuf>> {
        let local = match parse_store_url(path) {
            Some(hash) => self.blob_path(hash),
            None if path.starts_with(mlbatch_core::STORE_URL_PREFIX) => {
                return Err(StorageError::InvalidKey(path.to_string()))
            }
            None => PathBuf::from(path),
        };

        match tokio::fs::metadata(&local).await {
            Ok(meta) if meta.is_file() => Ok(Some(local)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn locator(&self) -> Option<StoreConfig> {
        Some(self.config.clone())
    }
}
