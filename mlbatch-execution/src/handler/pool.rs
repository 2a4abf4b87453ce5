use async_trait::async_trait;
use mlbatch_core::{Job, JobResult};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

use super::JobHandler;
use crate::error::ExecutionError;

/// Bounds how many jobs an inner handler runs at once
///
/// Clones of the same `Arc<PoolHandler>` share one bound, so several
/// batches can draw from the same pool.
pub struct PoolHandler {
    inner: Arc<dyn JobHandler>,
    slots: Semaphore,
    size: usize,
}

impl PoolHandler {
    pub fn new(inner: Arc<dyn JobHandler>, size: usize) -> Self {
        let size = size.max(1);
        Self {
            inner,
            slots: Semaphore::new(size),
            size,
        }
    }

    /// Pool with one slot per CPU
    pub fn with_cpu_count(inner: Arc<dyn JobHandler>) -> Self {
        Self::new(inner, num_cpus::get())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently in use
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

#[async_trait]
impl JobHandler for PoolHandler {
    async fn execute_job(&self, job: &Job) -> Result<Option<JobResult>, ExecutionError> {
        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|e| ExecutionError::Worker(format!("Job pool closed: {}", e)))?;
        debug!(
            label = job.label(),
            in_use = self.size - self.slots.available_permits(),
            "Running job in pool"
        );
        self.inner.execute_job(job).await
    }

    fn name(&self) -> &'static str {
        "pool"
    }
}
