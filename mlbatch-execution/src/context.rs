//! Per-dispatch execution context

use mlbatch_core::BatchOptions;
use std::fmt;
use std::sync::Arc;

use crate::handler::JobHandler;

/// Everything a [`JobExecutor`](crate::JobExecutor) needs to know about the
/// dispatch a job belongs to
#[derive(Clone, Default)]
pub struct ExecutionContext {
    /// Handler for jobs that miss the job cache; the local shell handler
    /// when unset
    pub handler: Option<Arc<dyn JobHandler>>,
    pub halt_key: Option<String>,
    pub status_key: Option<String>,
    pub result_key: Option<String>,
    pub cache_only: bool,
    /// Store key of the job cache; no caching when unset
    pub job_cache_key: Option<String>,
}

impl ExecutionContext {
    /// Context for a batch dispatched with `options`
    pub fn from_options(options: &BatchOptions) -> Self {
        Self {
            handler: None,
            halt_key: options.halt_key.clone(),
            status_key: options.status_key.clone(),
            result_key: options.result_key.clone(),
            cache_only: options.cache_only,
            job_cache_key: None,
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_job_cache_key(mut self, key: impl Into<String>) -> Self {
        self.job_cache_key = Some(key.into());
        self
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("handler", &self.handler.as_ref().map(|h| h.name()))
            .field("halt_key", &self.halt_key)
            .field("status_key", &self.status_key)
            .field("result_key", &self.result_key)
            .field("cache_only", &self.cache_only)
            .field("job_cache_key", &self.job_cache_key)
            .finish()
    }
}
