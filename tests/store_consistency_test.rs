//! Result reporting over a store whose reads lag behind its writes

use anyhow::Result;
use mlbatch_config::{MlbatchConfig, StoreConfig};
use mlbatch_core::{BatchOptions, Job, JobResult, JobSpec};
use mlbatch_storage::{FileKvStore, FlakyKvStore, KvStore, StatusResultStore, StorageError};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn flaky_file_store(dir: &TempDir, misses: u32) -> (Arc<FlakyKvStore>, StatusResultStore) {
    let config = StoreConfig::file(dir.path().join("db")).with_read_backoff(Duration::from_millis(10));
    let file: Arc<dyn KvStore> = Arc::new(FileKvStore::open(dir.path().join("db")).unwrap());
    let flaky = Arc::new(FlakyKvStore::new(file, misses));
    let store = StatusResultStore::new(flaky.clone(), &config);
    (flaky, store)
}

#[tokio::test]
async fn test_write_survives_transient_read_back_misses() -> Result<()> {
    let dir = TempDir::new()?;
    let (flaky, store) = flaky_file_store(&dir, 0);

    flaky.miss_next(2);
    store.put_result("results", 0, &JobResult::with_retcode(0)).await?;
    assert_eq!(flaky.reads(), 3);

    let result = store.get_result("results", 0, false).await?;
    assert_eq!(result.and_then(|r| r.retcode), Some(0));
    Ok(())
}

#[tokio::test]
async fn test_write_fails_once_read_back_budget_is_spent() -> Result<()> {
    let dir = TempDir::new()?;
    let (flaky, store) = flaky_file_store(&dir, 0);

    flaky.miss_next(10);
    let err = store
        .put_result("results", 3, &JobResult::with_retcode(0))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Consistency { attempts: 3, .. }));
    Ok(())
}

#[tokio::test]
async fn test_drain_waits_for_late_results() -> Result<()> {
    let dir = TempDir::new()?;
    let (flaky, store) = flaky_file_store(&dir, 0);
    store.put_result("results", 1, &JobResult::with_retcode(4)).await?;

    flaky.miss_next(2);
    let result = store.get_result("results", 1, false).await?;
    assert_eq!(result.and_then(|r| r.retcode), Some(4));

    flaky.miss_next(5);
    let err = store.get_result("results", 1, false).await.unwrap_err();
    assert!(matches!(err, StorageError::Unavailable { attempts: 3, .. }));
    Ok(())
}

#[tokio::test]
async fn test_batch_completes_over_lagging_store() -> Result<()> {
    let dir = TempDir::new()?;
    let (flaky, store) = flaky_file_store(&dir, 2);
    let mut config = MlbatchConfig::default();
    config.store = StoreConfig::file(dir.path().join("db"));

    let jobs = vec![Job::new(JobSpec::new("echo lagging"))];
    let options = BatchOptions::new("lagging").with_result_key("lagging-results");
    let results = mlbatch_execution::BatchOrchestrator::new(store.clone(), config)
        .run(jobs, &options)
        .await?;

    assert_eq!(results[0].retcode, Some(0));
    assert!(flaky.reads() >= 2);
    let stored = store.get_result("lagging-results", 0, true).await?;
    assert_eq!(stored.and_then(|r| r.retcode), Some(0));
    Ok(())
}
