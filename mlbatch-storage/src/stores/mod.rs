//! Key-value store implementations

pub mod file;
pub mod memory;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use file::FileKvStore;
pub use memory::InMemoryKvStore;

use mlbatch_config::{StoreBackend, StoreConfig};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

use crate::error::StorageResult;
use crate::kv::KvStore;

/// Open the store described by `config`
pub fn open_store(config: &StoreConfig) -> StorageResult<Arc<dyn KvStore>> {
    match &config.backend {
        StoreBackend::File { root } => {
            let mut store = FileKvStore::open(root)?;
            store.set_config(config.clone());
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => Ok(Arc::new(InMemoryKvStore::new())),
    }
}

/// Hex SHA-256 digest of `bytes`
pub(crate) fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Hex SHA-256 digest of a local file's content
///
/// `None` when `path` is not a regular file.
pub async fn file_digest(path: &Path) -> StorageResult<Option<String>> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => {
            let bytes = tokio::fs::read(path).await?;
            Ok(Some(hex_digest(&bytes)))
        }
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Split a `sha256://<hash>/<name>` location into its hash
pub(crate) fn parse_store_url(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(mlbatch_core::STORE_URL_PREFIX)?;
    let hash = rest.split('/').next()?;
    if hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hash)
    } else {
        None
    }
}
