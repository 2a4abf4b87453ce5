//! Batch orchestration
//!
//! Entry point of a batch run. Decides the dispatch mode from the options,
//! skips jobs that already carry results, optionally realizes inputs up
//! front, and returns one result per job in input order.

use mlbatch_config::MlbatchConfig;
use mlbatch_core::{BatchOptions, Job, JobResult};
use mlbatch_storage::{RealizedFiles, StatusResultStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::allocator::WorkIndexAllocator;
use crate::cluster::ClusterLauncher;
use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::executor::JobExecutor;
use crate::handler::JobHandler;

/// How pending jobs of a batch are dispatched
#[derive(Debug, Clone, PartialEq)]
enum Dispatch {
    Sequential,
    Pool(usize),
    IndexFile(PathBuf),
    Cluster(String),
}

impl Dispatch {
    fn for_options(options: &BatchOptions) -> Self {
        if let Some(path) = &options.index_file {
            Dispatch::IndexFile(path.clone())
        } else if let Some(spec) = &options.cluster_spec {
            Dispatch::Cluster(spec.clone())
        } else if let Some(workers) = options.num_workers {
            Dispatch::Pool(workers)
        } else {
            Dispatch::Sequential
        }
    }
}

/// Runs batches of jobs against one status/result store
pub struct BatchOrchestrator {
    store: StatusResultStore,
    config: MlbatchConfig,
    handler: Option<Arc<dyn JobHandler>>,
    realized: Arc<RealizedFiles>,
}

impl BatchOrchestrator {
    pub fn new(store: StatusResultStore, config: MlbatchConfig) -> Self {
        Self {
            store,
            config,
            handler: None,
            realized: Arc::new(RealizedFiles::new()),
        }
    }

    /// Run jobs through `handler` instead of the local shell handler
    ///
    /// Cluster workers are separate processes and always use their own
    /// default handler.
    pub fn with_handler(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn store(&self) -> &StatusResultStore {
        &self.store
    }

    /// Inputs realized by this orchestrator so far
    pub fn realized_files(&self) -> &RealizedFiles {
        &self.realized
    }

    /// Run a batch, returning one result per job in input order
    ///
    /// Jobs that come back without a computed result (cache-only misses,
    /// handlers that produced nothing, or jobs another index-file worker
    /// ran) carry a pending result.
    pub async fn run(
        &self,
        mut jobs: Vec<Job>,
        options: &BatchOptions,
    ) -> Result<Vec<JobResult>, ExecutionError> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let options = self.normalize(options)?;
        let cwd = std::env::current_dir()?;
        for job in &mut jobs {
            job.spec.absolutize_inputs(&cwd);
        }

        info!(
            label = %options.label,
            jobs = jobs.len(),
            dispatch = ?Dispatch::for_options(&options),
            "Starting batch"
        );

        if options.cluster_spec.is_some() {
            let precheck = BatchOptions {
                num_workers: Some(self.config.execution.cache_precheck_workers).filter(|n| *n > 1),
                cluster_spec: None,
                cache_only: true,
                prefetch_inputs: false,
                index_file: None,
                ..options.clone()
            };
            let cached = self.execute_batch(&jobs, &precheck).await?;

            let mut hits = 0;
            for (job, result) in jobs.iter_mut().zip(cached) {
                if !job.is_computed() && result.is_computed() {
                    job.result = Some(result);
                    hits += 1;
                }
            }
            debug!(hits, "Cache precheck finished");

            if jobs.iter().all(Job::is_computed) {
                info!(label = %options.label, "Every job is cached, skipping cluster launch");
                return Ok(jobs
                    .into_iter()
                    .map(|job| job.result.unwrap_or_else(JobResult::pending))
                    .collect());
            }
        }

        self.execute_batch(&jobs, &options).await
    }

    /// Check option combinations and fill in configured defaults
    fn normalize(&self, options: &BatchOptions) -> Result<BatchOptions, ExecutionError> {
        let mut options = options.clone();

        if options
            .cluster_spec
            .as_deref()
            .is_some_and(|spec| spec.trim().is_empty())
        {
            options.cluster_spec = None;
        }
        if options.num_workers.is_none() && options.index_file.is_none() {
            options.num_workers = self.config.execution.default_workers;
        }

        match options.num_workers {
            Some(0) => {
                return Err(ExecutionError::Configuration(
                    "num_workers must be at least 1".to_string(),
                ))
            }
            Some(1) => options.num_workers = None,
            _ => {}
        }

        if options.index_file.is_some() {
            if options.num_workers.is_some() {
                return Err(ExecutionError::Configuration(
                    "num_workers cannot be combined with index_file".to_string(),
                ));
            }
            if options.cluster_spec.is_some() {
                return Err(ExecutionError::Configuration(
                    "cluster_spec cannot be combined with index_file".to_string(),
                ));
            }
            if options.result_key.is_none() {
                return Err(ExecutionError::Configuration(
                    "index_file requires result_key".to_string(),
                ));
            }
        }

        if options.cache_only && options.cluster_spec.is_some() {
            debug!("Cache-only batch, running locally instead of on the cluster");
            options.cluster_spec = None;
        }

        Ok(options)
    }

    async fn execute_batch(
        &self,
        jobs: &[Job],
        options: &BatchOptions,
    ) -> Result<Vec<JobResult>, ExecutionError> {
        let dispatch = Dispatch::for_options(options);
        let pending: Vec<usize> = (0..jobs.len()).filter(|&i| !jobs[i].is_computed()).collect();

        if pending.is_empty() && !matches!(dispatch, Dispatch::IndexFile(_)) {
            return Ok(finish(jobs.iter().map(|job| job.result.clone()).collect()));
        }

        if !options.cache_only && options.prefetch_inputs {
            self.prefetch(jobs, &pending).await?;
        }

        let executor = self.executor(options);
        let mut results: Vec<Option<JobResult>> = jobs
            .iter()
            .map(|job| job.result.clone().filter(JobResult::is_computed))
            .collect();

        match dispatch {
            Dispatch::Sequential => {
                for &index in &pending {
                    results[index] = executor.run(&jobs[index], index).await?;
                }
            }
            Dispatch::Pool(size) => {
                self.run_pool(jobs, &pending, size, executor, &mut results)
                    .await?;
            }
            Dispatch::IndexFile(counter_file) => {
                // result_key presence is checked by normalize
                let result_key = options.result_key.as_deref().unwrap_or_default();
                results = self
                    .run_index_loop(jobs, &counter_file, &executor, result_key)
                    .await?;
            }
            Dispatch::Cluster(spec) => {
                let launcher = ClusterLauncher::new(self.store.clone(), self.config.cluster.clone())
                    .with_job_cache_key(self.config.execution.job_cache_key.clone());
                let pool_hint = options.num_workers.unwrap_or(1);
                let launched = launcher.launch(jobs, &spec, pool_hint, options).await?;
                for (slot, result) in results.iter_mut().zip(launched) {
                    if slot.is_none() {
                        *slot = Some(result);
                    }
                }
            }
        }

        Ok(finish(results))
    }

    fn executor(&self, options: &BatchOptions) -> JobExecutor {
        let mut context = ExecutionContext::from_options(options)
            .with_job_cache_key(self.config.execution.job_cache_key.clone());
        if let Some(handler) = &self.handler {
            context = context.with_handler(handler.clone());
        }
        JobExecutor::new(self.store.clone(), context).with_realized_files(self.realized.clone())
    }

    async fn prefetch(&self, jobs: &[Job], pending: &[usize]) -> Result<(), ExecutionError> {
        let locations = pending
            .iter()
            .flat_map(|&index| jobs[index].spec.required_inputs());
        let realized = self
            .realized
            .realize_all(self.store.kv().as_ref(), locations)
            .await?;
        if realized > 0 {
            info!(realized, "Prefetched job inputs");
        }
        Ok(())
    }

    async fn run_pool(
        &self,
        jobs: &[Job],
        pending: &[usize],
        size: usize,
        executor: JobExecutor,
        results: &mut [Option<JobResult>],
    ) -> Result<(), ExecutionError> {
        let executor = Arc::new(executor);
        let slots = Arc::new(Semaphore::new(size));
        let mut tasks = JoinSet::new();

        for &index in pending {
            let executor = executor.clone();
            let slots = slots.clone();
            let job = jobs[index].clone();
            tasks.spawn(async move {
                let _slot = slots
                    .acquire_owned()
                    .await
                    .map_err(|e| ExecutionError::Worker(format!("Job pool closed: {}", e)))?;
                let result = executor.run(&job, index).await?;
                Ok::<_, ExecutionError>((index, result))
            });
        }

        // A halt lets running jobs finish; queued jobs observe the halt too
        let mut halted = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((index, result))) => results[index] = result,
                Ok(Err(e)) if e.is_halted() => {
                    halted.get_or_insert(e);
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Aborting job pool");
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(ExecutionError::Worker(format!("Job task failed: {}", e)));
                }
            }
        }

        match halted {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Pull indices from the shared counter until the batch is exhausted
    async fn run_index_loop(
        &self,
        jobs: &[Job],
        counter_file: &Path,
        executor: &JobExecutor,
        result_key: &str,
    ) -> Result<Vec<Option<JobResult>>, ExecutionError> {
        let allocator = WorkIndexAllocator::new(counter_file);
        let mut results = vec![None; jobs.len()];
        let mut claimed = 0;

        loop {
            let index = allocator.claim_next().await?;
            if index >= jobs.len() {
                break;
            }
            claimed += 1;

            let job = &jobs[index];
            match job.result.as_ref().filter(|result| result.is_computed()) {
                Some(existing) => {
                    self.store.put_result(result_key, index, existing).await?;
                    results[index] = Some(existing.clone());
                }
                None => results[index] = executor.run(job, index).await?,
            }
        }

        info!(claimed, "Work index exhausted");
        Ok(results)
    }
}

fn finish(results: Vec<Option<JobResult>>) -> Vec<JobResult> {
    results
        .into_iter()
        .map(|result| result.unwrap_or_else(JobResult::pending))
        .collect()
}
