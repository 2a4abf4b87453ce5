//! Command implementations

pub mod run;
pub mod store;
pub mod worker;

use anyhow::{Context, Result};
use mlbatch_config::StoreConfig;
use mlbatch_core::{Job, JobSpec};
use mlbatch_storage::{open_store, StatusResultStore};
use serde::Deserialize;
use std::path::Path;

/// Entry of a jobs file: a full job (spec plus result) or a bare spec
#[derive(Deserialize)]
#[serde(untagged)]
enum JobEntry {
    Job(Job),
    Spec(JobSpec),
}

/// Read a JSON array of jobs
pub fn read_jobs(path: &Path) -> Result<Vec<Job>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read jobs file {:?}", path))?;
    let entries: Vec<JobEntry> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse jobs file {:?}", path))?;

    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            JobEntry::Job(job) => job,
            JobEntry::Spec(spec) => Job::new(spec),
        })
        .collect())
}

/// Open the status/result store described by `config`
pub fn open_status_store(config: &StoreConfig) -> Result<StatusResultStore> {
    let kv = open_store(config).context("Failed to open store")?;
    Ok(StatusResultStore::new(kv, config))
}
