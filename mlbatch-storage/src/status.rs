//! Status and result protocol over a key-value store
//!
//! Results and statuses of a batch live under a shared key with one subkey
//! per job index. Result writes are read back and retried when the store
//! has not made them visible yet; result reads that must succeed are retried
//! with a fixed backoff.

use mlbatch_config::StoreConfig;
use mlbatch_core::{JobResult, JobStatus};
use mlbatch_resilience::{RetryError, RetryExecutor, RetryPolicy};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::kv::KvStore;

/// Value written under a halt key
const HALT_VALUE: &str = "halt";

/// Typed status/result access with consistency retries
#[derive(Clone)]
pub struct StatusResultStore {
    kv: Arc<dyn KvStore>,
    write_policy: RetryPolicy,
    read_policy: RetryPolicy,
}

impl StatusResultStore {
    /// Use the retry budget of `config`
    pub fn new(kv: Arc<dyn KvStore>, config: &StoreConfig) -> Self {
        Self::with_policies(
            kv,
            RetryPolicy::immediate(config.write_attempts),
            RetryPolicy::fixed(config.read_attempts, config.read_backoff),
        )
    }

    pub fn with_policies(
        kv: Arc<dyn KvStore>,
        write_policy: RetryPolicy,
        read_policy: RetryPolicy,
    ) -> Self {
        Self {
            kv,
            write_policy,
            read_policy,
        }
    }

    /// Underlying key-value store
    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    /// Persist a job result and confirm it is readable
    pub async fn put_result(&self, key: &str, index: usize, result: &JobResult) -> StorageResult<()> {
        let subkey = index.to_string();
        let value = serde_json::to_value(result)?;
        self.save_confirmed(key, &subkey, &value).await
    }

    /// Fetch a job result
    ///
    /// With `cache_only` a single attempt is made and an absent result is
    /// `None`. Otherwise an absent result is retried and finally reported as
    /// [`StorageError::Unavailable`].
    pub async fn get_result(
        &self,
        key: &str,
        index: usize,
        cache_only: bool,
    ) -> StorageResult<Option<JobResult>> {
        let subkey = index.to_string();
        if cache_only {
            return self.load_result(key, &subkey).await;
        }

        let executor = RetryExecutor::new(self.read_policy.clone());
        let subkey = subkey.as_str();
        let outcome = executor
            .execute(|| async move {
                match self.load_result(key, subkey).await? {
                    Some(result) => Ok(result),
                    None => Err(StorageError::ResultMissing {
                        key: key.to_string(),
                        subkey: subkey.to_string(),
                    }),
                }
            })
            .await;

        match outcome {
            Ok(result) => Ok(Some(result)),
            Err(RetryError::MaxAttemptsExceeded { attempts, .. }) => {
                warn!(key, index, attempts, "Result never appeared in store");
                Err(StorageError::Unavailable {
                    key: key.to_string(),
                    subkey: subkey.to_string(),
                    attempts,
                })
            }
            Err(RetryError::NonRetryableError(e)) => Err(e),
        }
    }

    /// Record the status of a job
    pub async fn put_status(&self, key: &str, index: usize, status: JobStatus) -> StorageResult<()> {
        debug!(key, index, status = %status, "Recording job status");
        self.kv
            .set_value(key, Some(&index.to_string()), status.as_str())
            .await
    }

    pub async fn get_status(&self, key: &str, index: usize) -> StorageResult<Option<JobStatus>> {
        let value = self.kv.get_value(key, Some(&index.to_string())).await?;
        match value {
            Some(text) => text.trim().parse::<JobStatus>().map(Some).map_err(|e| {
                StorageError::SerializationError(format!("unknown job status '{}'", e.0))
            }),
            None => Ok(None),
        }
    }

    /// Every recorded status under `key`, by job index
    pub async fn statuses(&self, key: &str) -> StorageResult<BTreeMap<usize, JobStatus>> {
        let mut statuses = BTreeMap::new();
        for subkey in self.kv.list_subkeys(key).await? {
            let Ok(index) = subkey.parse::<usize>() else {
                continue;
            };
            if let Some(status) = self.get_status(key, index).await? {
                statuses.insert(index, status);
            }
        }
        Ok(statuses)
    }

    /// Whether the halt signal under `key` is set (any non-empty value)
    pub async fn is_halted(&self, key: &str) -> StorageResult<bool> {
        Ok(self
            .kv
            .get_value(key, None)
            .await?
            .is_some_and(|value| !value.trim().is_empty()))
    }

    pub async fn set_halt(&self, key: &str) -> StorageResult<()> {
        self.kv.set_value(key, None, HALT_VALUE).await
    }

    pub async fn clear_halt(&self, key: &str) -> StorageResult<()> {
        self.kv.delete_value(key, None).await
    }

    /// Look up a previously successful result by job signature
    pub async fn cached_result(&self, cache_key: &str, signature: &str) -> StorageResult<Option<JobResult>> {
        let result = self.load_result(cache_key, signature).await?;
        Ok(result.filter(JobResult::is_computed))
    }

    /// Remember a result under its job signature
    pub async fn cache_result(
        &self,
        cache_key: &str,
        signature: &str,
        result: &JobResult,
    ) -> StorageResult<()> {
        let value = serde_json::to_value(result)?;
        self.kv.save_object(cache_key, Some(signature), &value).await
    }

    async fn load_result(&self, key: &str, subkey: &str) -> StorageResult<Option<JobResult>> {
        match self.kv.load_object(key, Some(subkey)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn save_confirmed(
        &self,
        key: &str,
        subkey: &str,
        value: &serde_json::Value,
    ) -> StorageResult<()> {
        let executor = RetryExecutor::new(self.write_policy.clone());
        let kv = &self.kv;
        let outcome = executor
            .execute(|| async move {
                kv.save_object(key, Some(subkey), value).await?;
                match kv.load_object(key, Some(subkey)).await? {
                    Some(_) => Ok(()),
                    None => Err(StorageError::ReadBackMissing {
                        key: key.to_string(),
                        subkey: subkey.to_string(),
                    }),
                }
            })
            .await;

        match outcome {
            Ok(()) => Ok(()),
            Err(RetryError::MaxAttemptsExceeded { attempts, .. }) => {
                warn!(key, subkey, attempts, "Write never became visible in store");
                Err(StorageError::Consistency {
                    key: key.to_string(),
                    subkey: subkey.to_string(),
                    attempts,
                })
            }
            Err(RetryError::NonRetryableError(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::testing::FlakyKvStore;
    use crate::stores::InMemoryKvStore;
    use std::time::Duration;

    fn flaky(misses: u32) -> (Arc<FlakyKvStore>, StatusResultStore) {
        let kv = Arc::new(FlakyKvStore::new(Arc::new(InMemoryKvStore::new()), misses));
        let store = StatusResultStore::new(kv.clone(), &StoreConfig::memory());
        (kv, store)
    }

    #[tokio::test]
    async fn test_put_result_survives_transient_read_miss() {
        let (kv, store) = flaky(1);
        let result = JobResult::with_retcode(0);

        store.put_result("results", 4, &result).await.unwrap();

        assert_eq!(kv.reads(), 2);
        assert_eq!(
            store.get_result("results", 4, true).await.unwrap(),
            Some(result)
        );
    }

    #[tokio::test]
    async fn test_put_result_fails_after_three_misses() {
        let (kv, store) = flaky(3);

        let err = store
            .put_result("results", 0, &JobResult::with_retcode(0))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StorageError::Consistency { attempts: 3, .. }
        ));
        assert_eq!(kv.reads(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_result_retries_then_gives_up() {
        let (kv, store) = flaky(0);
        let started = tokio::time::Instant::now();

        let err = store.get_result("results", 7, false).await.unwrap_err();

        assert!(matches!(err, StorageError::Unavailable { attempts: 3, .. }));
        assert_eq!(kv.reads(), 3);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_result_recovers_from_late_visibility() {
        let (kv, store) = flaky(0);
        store
            .put_result("results", 1, &JobResult::with_retcode(3))
            .await
            .unwrap();
        kv.miss_next(2);

        let result = store.get_result("results", 1, false).await.unwrap();
        assert_eq!(result.and_then(|r| r.retcode), Some(3));
    }

    #[tokio::test]
    async fn test_cache_only_read_is_single_attempt() {
        let (kv, store) = flaky(0);
        assert_eq!(store.get_result("results", 0, true).await.unwrap(), None);
        assert_eq!(kv.reads(), 1);
    }

    #[tokio::test]
    async fn test_halt_signal() {
        let store = StatusResultStore::new(Arc::new(InMemoryKvStore::new()), &StoreConfig::memory());

        assert!(!store.is_halted("stop").await.unwrap());
        store.kv().set_value("stop", None, "  ").await.unwrap();
        assert!(!store.is_halted("stop").await.unwrap());

        store.set_halt("stop").await.unwrap();
        assert!(store.is_halted("stop").await.unwrap());

        store.clear_halt("stop").await.unwrap();
        assert!(!store.is_halted("stop").await.unwrap());
    }

    #[tokio::test]
    async fn test_statuses_by_index() {
        let store = StatusResultStore::new(Arc::new(InMemoryKvStore::new()), &StoreConfig::memory());

        store.put_status("st", 0, JobStatus::Running).await.unwrap();
        store.put_status("st", 0, JobStatus::Finished).await.unwrap();
        store.put_status("st", 2, JobStatus::ResultNotFound).await.unwrap();

        assert_eq!(
            store.get_status("st", 0).await.unwrap(),
            Some(JobStatus::Finished)
        );
        assert_eq!(store.get_status("st", 1).await.unwrap(), None);

        let all = store.statuses("st").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[&2], JobStatus::ResultNotFound);
    }

    #[tokio::test]
    async fn test_job_cache_ignores_pending_results() {
        let store = StatusResultStore::new(Arc::new(InMemoryKvStore::new()), &StoreConfig::memory());
        let signature = "a".repeat(64);

        store
            .cache_result("cache", &signature, &JobResult::pending())
            .await
            .unwrap();
        assert_eq!(store.cached_result("cache", &signature).await.unwrap(), None);

        store
            .cache_result("cache", &signature, &JobResult::with_retcode(0))
            .await
            .unwrap();
        assert!(store
            .cached_result("cache", &signature)
            .await
            .unwrap()
            .is_some());
    }
}
