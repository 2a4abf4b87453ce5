use anyhow::{Context, Result};
use mlbatch_config::{MlbatchConfig, StoreConfig};
use mlbatch_core::BatchOptions;
use mlbatch_execution::BatchOrchestrator;
use tracing::info;

use super::{open_status_store, read_jobs};
use crate::cli::WorkerArgs;

/// Pull and run jobs until the shared work index is exhausted
pub async fn run_worker(args: WorkerArgs, mut config: MlbatchConfig) -> Result<()> {
    let store_config = StoreConfig::from_yaml_file(&args.store_config)
        .with_context(|| format!("Failed to load store config {:?}", args.store_config))?;
    let store = open_status_store(&store_config)?;
    let jobs = read_jobs(&args.jobs)?;

    if let Some(key) = args.job_cache_key {
        config.execution.job_cache_key = key;
    }
    config.store = store_config;

    let worker = format!("worker-{}", std::process::id());
    info!("Cluster worker {} starting on {} jobs", worker, jobs.len());

    let mut options = BatchOptions::new(worker)
        .with_index_file(args.index_file)
        .with_result_key(args.result_key);
    options.status_key = args.status_key;
    options.halt_key = args.halt_key;

    BatchOrchestrator::new(store, config)
        .run(jobs, &options)
        .await?;
    Ok(())
}
