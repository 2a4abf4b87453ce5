use mlbatch_config::ClusterConfig;
use mlbatch_core::{BatchOptions, Job, JobResult};
use mlbatch_resilience::ProcessShutdownManager;
use mlbatch_storage::StatusResultStore;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::bootstrap::WorkerBootstrap;
use super::spec::ClusterSpec;
use super::HALTED_EXIT_CODE;
use crate::allocator::WorkIndexAllocator;
use crate::error::ExecutionError;

const JOBS_FILE: &str = "jobs.json";
const INDEX_FILE: &str = "index.txt";
const STORE_CONFIG_FILE: &str = "store.yaml";
const BOOTSTRAP_FILE: &str = "worker.sh";

/// Fans a batch out over worker processes started through the workload
/// manager, then collects their results from the store
pub struct ClusterLauncher {
    store: StatusResultStore,
    config: ClusterConfig,
    job_cache_key: Option<String>,
}

/// Outcome of one supervision pass
enum Supervision {
    Running,
    Finished,
    Failed { worker: usize, code: i32 },
}

impl ClusterLauncher {
    pub fn new(store: StatusResultStore, config: ClusterConfig) -> Self {
        Self {
            store,
            config,
            job_cache_key: None,
        }
    }

    /// Job cache key handed to the workers
    pub fn with_job_cache_key(mut self, key: impl Into<String>) -> Self {
        self.job_cache_key = Some(key.into());
        self
    }

    /// Run `jobs` on `pool_hint` worker processes
    ///
    /// Every job is handed to the workers. Jobs that already carry a result
    /// are re-persisted rather than executed, so the store ends up holding a
    /// result for every index and the returned vector matches `jobs`.
    pub async fn launch(
        &self,
        jobs: &[Job],
        cluster_spec: &str,
        pool_hint: usize,
        options: &BatchOptions,
    ) -> Result<Vec<JobResult>, ExecutionError> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let locator = self.store.kv().locator().ok_or_else(|| {
            ExecutionError::Configuration(
                "cluster workers cannot reopen this store; use a file store".to_string(),
            )
        })?;

        tokio::fs::create_dir_all(&self.config.scratch_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("mlbatch-cluster-")
            .tempdir_in(&self.config.scratch_dir)?;
        let scratch_path = scratch.path();

        let jobs_file = scratch_path.join(JOBS_FILE);
        tokio::fs::write(&jobs_file, serde_json::to_vec(jobs)?).await?;

        let allocator = WorkIndexAllocator::new(scratch_path.join(INDEX_FILE));
        allocator.initialize().await?;

        let store_config = scratch_path.join(STORE_CONFIG_FILE);
        locator.write_yaml_file(&store_config)?;

        let result_key = options
            .result_key
            .clone()
            .unwrap_or_else(|| format!("mlbatch-results-{}", Uuid::new_v4()));

        let bootstrap = WorkerBootstrap {
            program: self.worker_program()?,
            jobs_file,
            index_file: allocator.counter_file().to_path_buf(),
            store_config,
            result_key: result_key.clone(),
            status_key: options.status_key.clone(),
            halt_key: options.halt_key.clone(),
            job_cache_key: self.job_cache_key.clone(),
        };
        let script = scratch_path.join(BOOTSTRAP_FILE);
        tokio::fs::write(&script, bootstrap.render()).await?;

        let pending = jobs.iter().filter(|job| !job.is_computed()).count().max(1);
        let (spec, workers) = ClusterSpec::parse(cluster_spec).reconcile(pool_hint.max(1), pending);

        info!(
            label = %options.label,
            jobs = jobs.len(),
            workers,
            spec = %spec,
            "Launching cluster workers"
        );

        let mut children = self.spawn_workers(&spec, &script, scratch_path, workers)?;
        if let Some((worker, code)) = self.supervise(&mut children).await? {
            self.terminate(&mut children).await;
            if let Some(key) = self.halt_confirmed(code, options).await? {
                warn!(worker, key = %key, "Cluster worker stopped on halt signal");
                return Err(ExecutionError::Halted(key));
            }
            error!(worker, code, "Cluster worker failed, terminated the others");
            return Err(ExecutionError::ClusterWorkerFailure { worker, code });
        }

        info!(jobs = jobs.len(), result_key = %result_key, "Collecting cluster results");
        let mut results = Vec::with_capacity(jobs.len());
        for index in 0..jobs.len() {
            let result = self
                .store
                .get_result(&result_key, index, false)
                .await?
                .ok_or_else(|| {
                    ExecutionError::StoreUnavailable(format!("{}/{}", result_key, index))
                })?;
            results.push(result);
        }

        Ok(results)
    }

    /// Halt key of the batch if `code` is the halt exit and the signal is set
    async fn halt_confirmed(
        &self,
        code: i32,
        options: &BatchOptions,
    ) -> Result<Option<String>, ExecutionError> {
        match &options.halt_key {
            Some(key) if code == HALTED_EXIT_CODE && self.store.is_halted(key).await? => {
                Ok(Some(key.clone()))
            }
            _ => Ok(None),
        }
    }

    fn worker_program(&self) -> Result<PathBuf, ExecutionError> {
        match &self.config.worker_program {
            Some(program) => Ok(program.clone()),
            None => Ok(std::env::current_exe()?),
        }
    }

    fn spawn_workers(
        &self,
        spec: &ClusterSpec,
        script: &Path,
        scratch: &Path,
        workers: usize,
    ) -> Result<Vec<Child>, ExecutionError> {
        let (program, args) = spec.command_line(&self.config.launcher, &script.to_string_lossy());

        let mut children = Vec::with_capacity(workers);
        for worker in 0..workers {
            debug!(worker, program = %program, "Spawning cluster worker");
            let child = Command::new(&program)
                .args(&args)
                .current_dir(scratch)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| {
                    ExecutionError::Worker(format!("Failed to start {}: {}", program, e))
                });
            match child {
                Ok(child) => children.push(child),
                Err(e) => {
                    for child in &mut children {
                        let _ = child.start_kill();
                    }
                    return Err(e);
                }
            }
        }
        Ok(children)
    }

    /// Poll workers until all exit cleanly or one fails
    async fn supervise(
        &self,
        children: &mut [Child],
    ) -> Result<Option<(usize, i32)>, ExecutionError> {
        loop {
            match Self::poll(children)? {
                Supervision::Running => tokio::time::sleep(self.config.poll_interval).await,
                Supervision::Finished => return Ok(None),
                Supervision::Failed { worker, code } => return Ok(Some((worker, code))),
            }
        }
    }

    fn poll(children: &mut [Child]) -> Result<Supervision, ExecutionError> {
        let mut running = false;
        for (worker, child) in children.iter_mut().enumerate() {
            match child.try_wait()? {
                Some(status) if !status.success() => {
                    return Ok(Supervision::Failed {
                        worker,
                        code: status.code().unwrap_or(-1),
                    });
                }
                Some(_) => {}
                None => running = true,
            }
        }
        Ok(if running {
            Supervision::Running
        } else {
            Supervision::Finished
        })
    }

    async fn terminate(&self, children: &mut [Child]) {
        let outcomes =
            ProcessShutdownManager::shutdown_processes(children.iter_mut(), self.config.termination_grace)
                .await;
        for (worker, outcome) in outcomes.into_iter().enumerate() {
            if let Err(e) = outcome {
                warn!(worker, error = %e, "Failed to terminate cluster worker");
            }
        }
    }
}
