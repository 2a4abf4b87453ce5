//! Single-job execution

use mlbatch_core::{Job, JobResult, JobSpec, JobStatus};
use mlbatch_storage::{file_digest, RealizedFiles, StatusResultStore};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::handler::{JobHandler, LocalShellHandler};

/// Digest recorded for a local input that does not exist
const ABSENT_INPUT: &str = "absent";

/// Executes one job at a time within a dispatch
///
/// Checks the halt signal, records status transitions, consults the job
/// cache, invokes the handler and persists the result.
#[derive(Clone)]
pub struct JobExecutor {
    store: StatusResultStore,
    context: ExecutionContext,
    handler: Arc<dyn JobHandler>,
    realized: Arc<RealizedFiles>,
}

impl JobExecutor {
    pub fn new(store: StatusResultStore, context: ExecutionContext) -> Self {
        let handler: Arc<dyn JobHandler> = match &context.handler {
            Some(handler) => handler.clone(),
            None => Arc::new(LocalShellHandler::default()),
        };
        Self {
            store,
            context,
            handler,
            realized: Arc::new(RealizedFiles::new()),
        }
    }

    /// Share the realized-artifact cache of the owning orchestrator
    pub fn with_realized_files(mut self, realized: Arc<RealizedFiles>) -> Self {
        self.realized = realized;
        self
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Run the job at `index` of its batch
    ///
    /// Returns `Ok(None)` when the handler produced no result. In cache-only
    /// mode nothing runs and nothing is written: the cached result or a
    /// pending placeholder is returned.
    pub async fn run(&self, job: &Job, index: usize) -> Result<Option<JobResult>, ExecutionError> {
        if self.context.cache_only {
            let signature = self.cache_signature(job).await?;
            let cached = self.cached(signature.as_deref()).await?;
            return Ok(Some(cached.unwrap_or_else(JobResult::pending)));
        }

        if let Some(halt_key) = &self.context.halt_key {
            if self.store.is_halted(halt_key).await? {
                info!(index, key = %halt_key, "Halt signal set, not starting job");
                return Err(ExecutionError::Halted(halt_key.clone()));
            }
        }

        self.set_status(index, JobStatus::Running).await?;

        let signature = self.cache_signature(job).await?;
        let (result, from_cache) = match self.cached(signature.as_deref()).await? {
            Some(result) => {
                debug!(index, label = job.label(), "Job cache hit");
                (Some(result), true)
            }
            None => match self.execute(job).await {
                Ok(result) => (result, false),
                Err(e) => {
                    if let Err(status_err) = self.set_status(index, JobStatus::Error).await {
                        warn!(index, error = %status_err, "Failed to record job error status");
                    }
                    return Err(e);
                }
            },
        };

        let Some(result) = result else {
            warn!(
                index,
                label = job.label(),
                handler = self.handler.name(),
                "Handler produced no result"
            );
            self.set_status(index, JobStatus::ResultNotFound).await?;
            return Ok(None);
        };

        self.set_status(index, JobStatus::for_retcode(result.retcode))
            .await?;

        if let Some(result_key) = &self.context.result_key {
            self.store.put_result(result_key, index, &result).await?;
        }

        if !from_cache && result.succeeded() {
            if let (Some(cache_key), Some(signature)) = (&self.context.job_cache_key, &signature) {
                self.store
                    .cache_result(cache_key, signature, &result)
                    .await?;
            }
        }

        info!(
            index,
            label = job.label(),
            retcode = ?result.retcode,
            cached = from_cache,
            "Job completed"
        );
        Ok(Some(result))
    }

    /// Job cache signature covering the current content of local inputs
    ///
    /// `None` when the job cache does not apply to `job`.
    async fn cache_signature(&self, job: &Job) -> Result<Option<String>, ExecutionError> {
        if job.spec.force_run || self.context.job_cache_key.is_none() {
            return Ok(None);
        }

        let mut digests = BTreeMap::new();
        for location in job.spec.local_inputs() {
            let digest = file_digest(Path::new(location))
                .await?
                .unwrap_or_else(|| ABSENT_INPUT.to_string());
            digests.insert(location.to_string(), digest);
        }
        Ok(Some(job.spec.content_signature(&digests)))
    }

    /// Cached result for `signature`, if its recorded outputs still exist
    async fn cached(&self, signature: Option<&str>) -> Result<Option<JobResult>, ExecutionError> {
        let (Some(cache_key), Some(signature)) = (&self.context.job_cache_key, signature) else {
            return Ok(None);
        };
        let Some(result) = self.store.cached_result(cache_key, signature).await? else {
            return Ok(None);
        };

        for location in result.outputs.values() {
            if !JobSpec::is_store_url(location) && !tokio::fs::try_exists(location).await? {
                debug!(output = %location, "Cached output no longer exists, ignoring cache entry");
                return Ok(None);
            }
        }
        Ok(Some(result))
    }

    async fn execute(&self, job: &Job) -> Result<Option<JobResult>, ExecutionError> {
        let job = self.resolve_inputs(job).await?;
        self.handler.execute_job(&job).await
    }

    /// Replace store URL inputs with the local paths of their realized copies
    async fn resolve_inputs<'a>(&self, job: &'a Job) -> Result<Cow<'a, Job>, ExecutionError> {
        let urls: Vec<&str> = job
            .spec
            .required_inputs()
            .filter(|location| JobSpec::is_store_url(location))
            .collect();
        if urls.is_empty() {
            return Ok(Cow::Borrowed(job));
        }

        self.realized
            .realize_all(self.store.kv().as_ref(), urls)
            .await?;

        let mut resolved = job.clone();
        let spec = &mut resolved.spec;
        for location in spec.inputs.values_mut().chain(spec.files_to_realize.iter_mut()) {
            if let Some(local) = self.realized.get(location.as_str()) {
                *location = local.to_string_lossy().into_owned();
            }
        }
        Ok(Cow::Owned(resolved))
    }

    async fn set_status(&self, index: usize, status: JobStatus) -> Result<(), ExecutionError> {
        if let Some(status_key) = &self.context.status_key {
            self.store.put_status(status_key, index, status).await?;
        }
        Ok(())
    }
}
