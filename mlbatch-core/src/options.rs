//! Batch dispatch options

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options controlling one batch dispatch
///
/// The dispatch mode follows from the options: `cluster_spec` selects a
/// cluster launch, `index_file` makes this process a cluster worker pulling
/// indices, `num_workers` selects a local pool and everything else runs
/// sequentially.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Cosmetic label used in logs
    pub label: String,

    /// Local worker pool size
    pub num_workers: Option<usize>,

    /// Store key of the halt signal
    pub halt_key: Option<String>,

    /// Store key under which per-job statuses are recorded
    pub status_key: Option<String>,

    /// Store key under which per-job results are recorded
    pub result_key: Option<String>,

    /// Cluster resource specification, e.g. `-n 4 -c 2` or `fake`
    pub cluster_spec: Option<String>,

    /// Only read cached results, never execute
    pub cache_only: bool,

    /// Realize declared input artifacts before execution starts
    pub prefetch_inputs: bool,

    /// Shared counter file; makes this process an index-pulling worker
    pub index_file: Option<PathBuf>,
}

impl BatchOptions {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = Some(num_workers);
        self
    }

    pub fn with_halt_key(mut self, key: impl Into<String>) -> Self {
        self.halt_key = Some(key.into());
        self
    }

    pub fn with_status_key(mut self, key: impl Into<String>) -> Self {
        self.status_key = Some(key.into());
        self
    }

    pub fn with_result_key(mut self, key: impl Into<String>) -> Self {
        self.result_key = Some(key.into());
        self
    }

    pub fn with_cluster_spec(mut self, spec: impl Into<String>) -> Self {
        self.cluster_spec = Some(spec.into());
        self
    }

    pub fn with_cache_only(mut self, cache_only: bool) -> Self {
        self.cache_only = cache_only;
        self
    }

    pub fn with_prefetch_inputs(mut self, prefetch: bool) -> Self {
        self.prefetch_inputs = prefetch;
        self
    }

    pub fn with_index_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_file = Some(path.into());
        self
    }
}
