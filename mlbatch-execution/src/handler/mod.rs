//! Job handlers
//!
//! A handler runs exactly one job and reports its result. The orchestrator
//! never looks inside a job specification; everything job-specific happens
//! behind this trait.

mod cluster;
mod local;
mod pool;

pub use cluster::ClusterHandler;
pub use local::LocalShellHandler;
pub use pool::PoolHandler;

use async_trait::async_trait;
use mlbatch_core::{Job, JobResult};

use crate::error::ExecutionError;

/// Runs a single job
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Execute `job`
    ///
    /// `Ok(None)` means the handler ran but produced no result. A job that
    /// ran and failed is `Ok(Some(result))` with a non-zero return code;
    /// errors are reserved for infrastructure failures.
    async fn execute_job(&self, job: &Job) -> Result<Option<JobResult>, ExecutionError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}
