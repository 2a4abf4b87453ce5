//! Cross-process work index allocation
//!
//! Workers share nothing but the path of a counter file holding the next
//! index to hand out. A worker claims the counter by renaming it to a name
//! only it knows; rename is atomic, so exactly one contender wins. The
//! winner reads the value, writes the successor and renames the file back.
//! Losers back off for a random 1-50 ms and try again.

use rand::Rng;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::ExecutionError;

const MIN_BACKOFF_MS: u64 = 1;
const MAX_BACKOFF_MS: u64 = 50;

/// Hands out consecutive job indices through a shared counter file
#[derive(Debug, Clone)]
pub struct WorkIndexAllocator {
    counter_file: PathBuf,
}

impl WorkIndexAllocator {
    pub fn new(counter_file: impl Into<PathBuf>) -> Self {
        Self {
            counter_file: counter_file.into(),
        }
    }

    pub fn counter_file(&self) -> &Path {
        &self.counter_file
    }

    /// Reset the counter to zero
    pub async fn initialize(&self) -> Result<(), ExecutionError> {
        tokio::fs::write(&self.counter_file, "0").await?;
        Ok(())
    }

    /// Claim the next index
    ///
    /// Retries until the counter file can be claimed, so a counter that was
    /// never initialized blocks the caller.
    pub async fn claim_next(&self) -> Result<usize, ExecutionError> {
        let claim = self.claim_path();

        loop {
            match tokio::fs::rename(&self.counter_file, &claim).await {
                Ok(()) => return self.advance(&claim).await,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    let wait = rand::thread_rng().gen_range(MIN_BACKOFF_MS..=MAX_BACKOFF_MS);
                    trace!(wait_ms = wait, "Counter file busy, backing off");
                    tokio::time::sleep(Duration::from_millis(wait)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn advance(&self, claim: &Path) -> Result<usize, ExecutionError> {
        let text = tokio::fs::read_to_string(claim).await?;
        let value: usize = match text.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                // Other claimers must see the corrupt counter too
                tokio::fs::rename(claim, &self.counter_file).await?;
                return Err(ExecutionError::Worker(format!(
                    "Counter file {} holds '{}', expected an index",
                    self.counter_file.display(),
                    text.trim()
                )));
            }
        };

        tokio::fs::write(claim, (value + 1).to_string()).await?;
        tokio::fs::rename(claim, &self.counter_file).await?;

        debug!(index = value, "Claimed work index");
        Ok(value)
    }

    fn claim_path(&self) -> PathBuf {
        let name = self
            .counter_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "counter".to_string());
        self.counter_file
            .with_file_name(format!("{}.claim-{}", name, Uuid::new_v4()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn test_sequential_claims() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = WorkIndexAllocator::new(dir.path().join("index.txt"));
        allocator.initialize().await.unwrap();

        for expected in 0..5 {
            assert_eq!(allocator.claim_next().await.unwrap(), expected);
        }
        assert_eq!(
            std::fs::read_to_string(allocator.counter_file()).unwrap(),
            "5"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_claimers_get_each_index_once() {
        const JOBS: usize = 60;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.txt");
        WorkIndexAllocator::new(&path).initialize().await.unwrap();

        let mut claimers = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let allocator = WorkIndexAllocator::new(&path);
            claimers.spawn(async move {
                let mut claimed = Vec::new();
                loop {
                    let index = allocator.claim_next().await.unwrap();
                    claimed.push(index);
                    if index >= JOBS {
                        return claimed;
                    }
                }
            });
        }

        let mut all = Vec::new();
        while let Some(claimed) = claimers.join_next().await {
            all.extend(claimed.unwrap());
        }

        let unique: BTreeSet<usize> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len(), "an index was handed out twice");
        assert_eq!(unique, (0..JOBS + 8).collect());
    }

    #[tokio::test]
    async fn test_corrupt_counter_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.txt");
        std::fs::write(&path, "not a number").unwrap();

        let err = WorkIndexAllocator::new(&path).claim_next().await.unwrap_err();
        assert!(matches!(err, ExecutionError::Worker(_)));
    }

    #[tokio::test]
    async fn test_corrupt_counter_is_released_for_other_workers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.txt");
        std::fs::write(&path, "garbage").unwrap();

        let first = WorkIndexAllocator::new(&path);
        assert!(first.claim_next().await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "garbage");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().contains(".claim-"))
            .collect();
        assert!(leftovers.is_empty());

        // A second worker gets the same error instead of waiting forever
        let second = WorkIndexAllocator::new(&path);
        let outcome = tokio::time::timeout(Duration::from_secs(5), second.claim_next()).await;
        assert!(matches!(outcome, Ok(Err(ExecutionError::Worker(_)))));
    }
}
