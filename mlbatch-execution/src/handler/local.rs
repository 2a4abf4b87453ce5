use async_trait::async_trait;
use chrono::Utc;
use mlbatch_core::{Job, JobResult, JobTiming};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::JobHandler;
use crate::error::ExecutionError;

/// Return code reported for a job killed by its timeout
const TIMEOUT_RETCODE: i32 = -1;

/// Runs a job's command through a shell in a scratch directory
///
/// Parameters, inputs and outputs are exported as `MLBATCH_PARAM_<NAME>`,
/// `MLBATCH_INPUT_<NAME>` and `MLBATCH_OUTPUT_<NAME>`. Relative output paths
/// are resolved against the working directory of this process, since the
/// command itself runs in a temporary directory that is removed afterwards.
#[derive(Debug, Clone)]
pub struct LocalShellHandler {
    shell: String,
    scratch_root: Option<PathBuf>,
}

impl Default for LocalShellHandler {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
            scratch_root: None,
        }
    }
}

impl LocalShellHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Create per-job scratch directories under `root`
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    fn scratch_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("mlbatch-job-");
        match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }
}

/// Environment variable name for a named value
fn env_name(prefix: &str, name: &str) -> String {
    let name: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("MLBATCH_{}_{}", prefix, name)
}

fn parameter_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn resolve(path: &str, base: &Path) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[async_trait]
impl JobHandler for LocalShellHandler {
    async fn execute_job(&self, job: &Job) -> Result<Option<JobResult>, ExecutionError> {
        let spec = &job.spec;
        let started_at = Utc::now();
        let cwd = std::env::current_dir()?;
        let scratch = self.scratch_dir()?;

        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(&spec.command)
            .current_dir(scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env("MLBATCH_JOB_LABEL", &spec.label);

        for (name, value) in &spec.parameters {
            command.env(env_name("PARAM", name), parameter_value(value));
        }
        for (name, location) in &spec.inputs {
            command.env(env_name("INPUT", name), location);
        }
        let outputs: Vec<(String, PathBuf)> = spec
            .outputs
            .iter()
            .map(|(name, path)| (name.clone(), resolve(path, &cwd)))
            .collect();
        for (name, path) in &outputs {
            command.env(env_name("OUTPUT", name), path);
        }

        debug!(label = %spec.label, command = %spec.command, "Spawning job command");
        let child = command.spawn().map_err(|e| {
            ExecutionError::Worker(format!("Failed to spawn {}: {}", self.shell, e))
        })?;

        let output = match spec.timeout_secs {
            Some(secs) => {
                match tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output())
                    .await
                {
                    Ok(output) => output?,
                    Err(_) => {
                        warn!(label = %spec.label, timeout_secs = secs, "Job timed out");
                        return Ok(Some(
                            JobResult::with_retcode(TIMEOUT_RETCODE)
                                .with_console_out(format!("Job timed out after {} seconds", secs))
                                .with_timing(JobTiming::since(started_at)),
                        ));
                    }
                }
            }
            None => child.wait_with_output().await?,
        };

        let retcode = output.status.code().unwrap_or(TIMEOUT_RETCODE);
        let mut console = String::from_utf8_lossy(&output.stdout).into_owned();
        console.push_str(&String::from_utf8_lossy(&output.stderr));

        let mut result = JobResult::with_retcode(retcode)
            .with_console_out(console)
            .with_timing(JobTiming::since(started_at));
        for (name, path) in outputs {
            if path.exists() {
                result = result.with_output(name, path.to_string_lossy());
            }
        }

        info!(label = %spec.label, retcode, "Job command completed");
        Ok(Some(result))
    }

    fn name(&self) -> &'static str {
        "local-shell"
    }
}
