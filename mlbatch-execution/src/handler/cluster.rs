use async_trait::async_trait;
use mlbatch_core::{BatchOptions, Job, JobResult};
use std::sync::Arc;

use super::JobHandler;
use crate::cluster::ClusterLauncher;
use crate::error::ExecutionError;

/// Runs each job as its own single-job cluster launch
pub struct ClusterHandler {
    launcher: Arc<ClusterLauncher>,
    cluster_spec: String,
    options: BatchOptions,
}

impl ClusterHandler {
    pub fn new(launcher: Arc<ClusterLauncher>, cluster_spec: impl Into<String>) -> Self {
        Self {
            launcher,
            cluster_spec: cluster_spec.into(),
            options: BatchOptions::default(),
        }
    }

    /// Halt and status keys forwarded to the launched worker
    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl JobHandler for ClusterHandler {
    async fn execute_job(&self, job: &Job) -> Result<Option<JobResult>, ExecutionError> {
        let job = Job::new(job.spec.clone());
        let mut options = self.options.clone();
        if options.label.is_empty() {
            options.label = job.label().to_string();
        }
        // Each launch drains index 0, so it needs a key of its own
        options.result_key = None;

        let results = self
            .launcher
            .launch(std::slice::from_ref(&job), &self.cluster_spec, 1, &options)
            .await?;
        Ok(results.into_iter().next())
    }

    fn name(&self) -> &'static str {
        "cluster"
    }
}
