//! Cache of artifacts already materialized by this process

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::kv::KvStore;

/// Remembers which artifact locations have been realized, and where
#[derive(Debug, Default)]
pub struct RealizedFiles {
    realized: Mutex<HashMap<String, PathBuf>>,
}

impl RealizedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local path of a previously realized location
    pub fn get(&self, location: &str) -> Option<PathBuf> {
        self.realized.lock().get(location).cloned()
    }

    pub fn len(&self) -> usize {
        self.realized.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.realized.lock().is_empty()
    }

    /// Realize every location not seen before, each at most once
    ///
    /// Fails with [`StorageError::ArtifactUnavailable`] on the first
    /// location the store cannot materialize.
    pub async fn realize_all<'a, I>(&self, kv: &dyn KvStore, locations: I) -> StorageResult<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let wanted: BTreeSet<&str> = locations
            .into_iter()
            .filter(|location| !self.realized.lock().contains_key(*location))
            .collect();

        if wanted.is_empty() {
            return Ok(0);
        }
        info!(count = wanted.len(), "Realizing input files");

        for location in &wanted {
            let local = kv
                .realize_file(location)
                .await?
                .ok_or_else(|| StorageError::ArtifactUnavailable(location.to_string()))?;
            debug!(location, local = %local.display(), "Realized file");
            self.realized.lock().insert(location.to_string(), local);
        }

        Ok(wanted.len())
    }
}
