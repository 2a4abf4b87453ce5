//! End-to-end batch runs against a file-backed store

use anyhow::Result;
use async_trait::async_trait;
use mlbatch_config::{MlbatchConfig, StoreConfig};
use mlbatch_core::{BatchOptions, Job, JobResult, JobSpec, JobStatus};
use mlbatch_execution::{BatchOrchestrator, ExecutionError, JobHandler};
use mlbatch_storage::{open_store, KvStore, StatusResultStore};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Counts invocations and echoes the job label
#[derive(Default)]
struct CountingHandler {
    calls: AtomicUsize,
}

impl CountingHandler {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobHandler for CountingHandler {
    async fn execute_job(&self, job: &Job) -> Result<Option<JobResult>, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(JobResult::with_retcode(0).with_console_out(job.label())))
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

struct Fixture {
    dir: TempDir,
    config: MlbatchConfig,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = MlbatchConfig::default();
        config.store = StoreConfig::file(dir.path().join("db"));
        Self { dir, config }
    }

    fn store(&self) -> StatusResultStore {
        let kv = open_store(&self.config.store).unwrap();
        StatusResultStore::new(kv, &self.config.store)
    }

    fn orchestrator(&self) -> BatchOrchestrator {
        BatchOrchestrator::new(self.store(), self.config.clone())
    }
}

fn shell_jobs(count: usize) -> Vec<Job> {
    (0..count)
        .map(|i| {
            Job::new(
                JobSpec::new(format!("echo job-{}; exit {}", i, i % 2)).with_label(format!("job-{}", i)),
            )
        })
        .collect()
}

fn labelled_jobs(count: usize) -> Vec<Job> {
    (0..count)
        .map(|i| Job::new(JobSpec::new(format!("run {}", i)).with_label(format!("job-{}", i))))
        .collect()
}

#[tokio::test]
async fn test_shell_batch_on_local_pool() -> Result<()> {
    let fixture = Fixture::new();
    let options = BatchOptions::new("pool")
        .with_num_workers(2)
        .with_status_key("pool-status")
        .with_result_key("pool-results");

    let results = fixture.orchestrator().run(shell_jobs(5), &options).await?;

    assert_eq!(results.len(), 5);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.retcode, Some((i % 2) as i32));
        assert_eq!(
            result.console_out.as_deref().map(str::trim),
            Some(format!("job-{}", i).as_str())
        );
    }

    // A second process sees the same statuses and results through the store
    let store = fixture.store();
    let statuses = store.statuses("pool-status").await?;
    assert_eq!(statuses.len(), 5);
    assert_eq!(statuses[&0], JobStatus::Finished);
    assert_eq!(statuses[&1], JobStatus::Error);

    let stored = store.get_result("pool-results", 4, false).await?;
    assert_eq!(stored.and_then(|r| r.retcode), Some(0));
    Ok(())
}

#[tokio::test]
async fn test_sequential_batch_preserves_order() -> Result<()> {
    let fixture = Fixture::new();
    let results = fixture
        .orchestrator()
        .run(shell_jobs(4), &BatchOptions::new("sequential"))
        .await?;

    let outputs: Vec<String> = results
        .iter()
        .map(|r| r.console_out.clone().unwrap_or_default().trim().to_string())
        .collect();
    assert_eq!(outputs, vec!["job-0", "job-1", "job-2", "job-3"]);
    Ok(())
}

#[tokio::test]
async fn test_rerun_is_served_from_job_cache() -> Result<()> {
    let fixture = Fixture::new();
    let handler = Arc::new(CountingHandler::default());
    let options = BatchOptions::new("cached").with_num_workers(3);

    let first = fixture
        .orchestrator()
        .with_handler(handler.clone())
        .run(labelled_jobs(5), &options)
        .await?;
    assert_eq!(handler.calls(), 5);

    // Fresh job objects with identical specifications
    let second = fixture
        .orchestrator()
        .with_handler(handler.clone())
        .run(labelled_jobs(5), &options)
        .await?;
    assert_eq!(handler.calls(), 5);

    let labels = |results: &[JobResult]| -> Vec<Option<String>> {
        results.iter().map(|r| r.console_out.clone()).collect()
    };
    assert_eq!(labels(&first), labels(&second));
    Ok(())
}

#[tokio::test]
async fn test_edited_input_is_recomputed() -> Result<()> {
    let fixture = Fixture::new();
    let input = fixture.dir.path().join("data.txt");
    let jobs = || {
        vec![Job::new(
            JobSpec::new("cat \"$MLBATCH_INPUT_DATA\"")
                .with_input("data", input.to_string_lossy()),
        )]
    };

    std::fs::write(&input, "first")?;
    let results = fixture
        .orchestrator()
        .run(jobs(), &BatchOptions::new("edit"))
        .await?;
    assert_eq!(results[0].console_out.as_deref(), Some("first"));

    std::fs::write(&input, "second")?;
    let results = fixture
        .orchestrator()
        .run(jobs(), &BatchOptions::new("edit"))
        .await?;
    assert_eq!(results[0].console_out.as_deref(), Some("second"));
    Ok(())
}

#[tokio::test]
async fn test_store_url_input_is_realized_for_shell_job() -> Result<()> {
    let fixture = Fixture::new();
    let raw = fixture.dir.path().join("raw.txt");
    std::fs::write(&raw, "stored content")?;
    let url = fixture.store().kv().save_file(&raw).await?;
    std::fs::remove_file(&raw)?;

    let jobs = vec![Job::new(
        JobSpec::new("cat \"$MLBATCH_INPUT_RAW\"").with_input("raw", url.clone()),
    )];
    let options = BatchOptions::new("realize").with_prefetch_inputs(true);
    let results = fixture.orchestrator().run(jobs, &options).await?;

    assert_eq!(results[0].retcode, Some(0));
    assert_eq!(results[0].console_out.as_deref(), Some("stored content"));
    Ok(())
}

#[tokio::test]
async fn test_force_run_bypasses_job_cache() -> Result<()> {
    let fixture = Fixture::new();
    let handler = Arc::new(CountingHandler::default());
    let jobs = || vec![Job::new(JobSpec::new("run").with_force_run(true))];

    for _ in 0..2 {
        fixture
            .orchestrator()
            .with_handler(handler.clone())
            .run(jobs(), &BatchOptions::new("forced"))
            .await?;
    }
    assert_eq!(handler.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_halt_signal_stops_batch() -> Result<()> {
    let fixture = Fixture::new();
    let handler = Arc::new(CountingHandler::default());
    fixture.store().set_halt("stop").await?;

    let options = BatchOptions::new("halted")
        .with_num_workers(2)
        .with_halt_key("stop");
    let err = fixture
        .orchestrator()
        .with_handler(handler.clone())
        .run(labelled_jobs(4), &options)
        .await
        .unwrap_err();

    assert!(err.is_halted(), "unexpected error: {}", err);
    assert_eq!(handler.calls(), 0);

    fixture.store().clear_halt("stop").await?;
    let results = fixture
        .orchestrator()
        .with_handler(handler.clone())
        .run(labelled_jobs(4), &options)
        .await?;
    assert_eq!(results.len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_cache_only_batch_never_executes() -> Result<()> {
    let fixture = Fixture::new();
    let handler = Arc::new(CountingHandler::default());

    fixture
        .orchestrator()
        .with_handler(handler.clone())
        .run(labelled_jobs(2), &BatchOptions::new("warm"))
        .await?;

    let results = fixture
        .orchestrator()
        .with_handler(handler.clone())
        .run(labelled_jobs(3), &BatchOptions::new("lookup").with_cache_only(true))
        .await?;

    assert_eq!(handler.calls(), 2);
    assert!(results[0].is_computed());
    assert!(results[1].is_computed());
    assert!(!results[2].is_computed());
    Ok(())
}

#[tokio::test]
async fn test_conflicting_options_are_rejected() {
    let fixture = Fixture::new();

    let zero_workers = BatchOptions::new("zero").with_num_workers(0);
    let err = fixture
        .orchestrator()
        .run(labelled_jobs(1), &zero_workers)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::Configuration(_)));

    let index_and_pool = BatchOptions::new("conflict")
        .with_num_workers(2)
        .with_index_file(fixture.dir.path().join("index.txt"))
        .with_result_key("r");
    let err = fixture
        .orchestrator()
        .run(labelled_jobs(1), &index_and_pool)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::Configuration(_)));
}
