//! Cluster launch configuration

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Cluster launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Workload manager launch command
    pub launcher: String,

    /// Parent directory of per-batch scratch directories; must be visible
    /// from every cluster node
    pub scratch_dir: PathBuf,

    /// Program re-invoked by the worker bootstrap; defaults to the current
    /// executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_program: Option<PathBuf>,

    /// Interval between worker process polls
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Time a terminated worker gets between SIGTERM and SIGKILL
    #[serde(with = "humantime_serde")]
    pub termination_grace: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            launcher: "srun".to_string(),
            scratch_dir: std::env::temp_dir(),
            worker_program: None,
            poll_interval: Duration::from_secs(1),
            termination_grace: Duration::from_secs(10),
        }
    }
}

impl Validatable for ClusterConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.launcher, "launcher", self.domain_name())?;

        if self.poll_interval.is_zero() {
            return Err(self.validation_error("poll_interval must be greater than 0"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "cluster"
    }
}
