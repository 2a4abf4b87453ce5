//! Batch execution configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};

/// Batch execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Pool size of the cache-only precheck performed before a cluster launch
    pub cache_precheck_workers: usize,

    /// Pool size used when a batch does not request one
    pub default_workers: Option<usize>,

    /// Store key holding successful results by job signature
    pub job_cache_key: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            cache_precheck_workers: default_cache_precheck_workers(),
            default_workers: None,
            job_cache_key: default_job_cache_key(),
        }
    }
}

impl Validatable for ExecutionConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.cache_precheck_workers,
            "cache_precheck_workers",
            self.domain_name(),
        )?;

        if let Some(workers) = self.default_workers {
            validate_positive(workers, "default_workers", self.domain_name())?;
        }

        validate_required_string(&self.job_cache_key, "job_cache_key", self.domain_name())?;

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "execution"
    }
}

fn default_cache_precheck_workers() -> usize {
    20
}

fn default_job_cache_key() -> String {
    "mlbatch-job-cache".to_string()
}
