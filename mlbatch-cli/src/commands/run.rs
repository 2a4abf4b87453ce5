use anyhow::{Context, Result};
use mlbatch_config::MlbatchConfig;
use mlbatch_core::BatchOptions;
use mlbatch_execution::BatchOrchestrator;
use tracing::{info, warn};

use super::{open_status_store, read_jobs};
use crate::cli::RunArgs;

/// Run a batch and emit its results as JSON
pub async fn run_batch(args: RunArgs, config: MlbatchConfig) -> Result<()> {
    let jobs = read_jobs(&args.jobs)?;
    let store = open_status_store(&config.store)?;

    let label = args.label.unwrap_or_else(|| {
        args.jobs
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "batch".to_string())
    });
    let options = BatchOptions {
        label,
        num_workers: args.workers,
        halt_key: args.halt_key,
        status_key: args.status_key,
        result_key: args.result_key,
        cluster_spec: args.cluster,
        cache_only: args.cache_only,
        prefetch_inputs: args.prefetch_inputs,
        index_file: None,
    };

    let orchestrator = BatchOrchestrator::new(store, config);
    let results = orchestrator.run(jobs, &options).await?;

    let failed = results
        .iter()
        .filter(|result| result.is_computed() && !result.succeeded())
        .count();
    if failed > 0 {
        warn!("{} of {} jobs failed", failed, results.len());
    }
    info!("Batch {} completed with {} results", options.label, results.len());

    let formatted =
        serde_json::to_string_pretty(&results).context("Failed to format results as JSON")?;
    match args.output {
        Some(path) => std::fs::write(&path, formatted)
            .with_context(|| format!("Failed to write results to {:?}", path))?,
        None => println!("{}", formatted),
    }

    Ok(())
}
