//! Job result model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Timing metadata recorded by a job handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTiming {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl JobTiming {
    /// Timing for a run that started at `started_at` and ends now
    pub fn since(started_at: DateTime<Utc>) -> Self {
        let completed_at = Utc::now();
        let elapsed_ms = completed_at
            .signed_duration_since(started_at)
            .num_milliseconds()
            .max(0) as u64;
        Self {
            started_at,
            completed_at,
            elapsed_ms,
        }
    }
}

/// Outcome of a job
///
/// A `None` return code means the job has not been executed yet. Once a
/// return code is set the result is treated as immutable and the job is
/// skipped on re-submission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobResult {
    pub retcode: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_out: Option<String>,

    /// Named outputs mapped to artifact locations
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<JobTiming>,
}

impl JobResult {
    /// Placeholder for a job that has not been executed
    pub fn pending() -> Self {
        Self::default()
    }

    /// Result carrying only a return code
    pub fn with_retcode(retcode: i32) -> Self {
        Self {
            retcode: Some(retcode),
            ..Self::default()
        }
    }

    pub fn with_console_out(mut self, console_out: impl Into<String>) -> Self {
        self.console_out = Some(console_out.into());
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, location: impl Into<String>) -> Self {
        self.outputs.insert(name.into(), location.into());
        self
    }

    pub fn with_timing(mut self, timing: JobTiming) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Whether the job has been executed (successfully or not)
    pub fn is_computed(&self) -> bool {
        self.retcode.is_some()
    }

    /// Whether the job ran and returned zero
    pub fn succeeded(&self) -> bool {
        self.retcode == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_result() {
        let result = JobResult::pending();
        assert!(!result.is_computed());
        assert!(!result.succeeded());
    }

    #[test]
    fn test_failed_result_is_computed() {
        let result = JobResult::with_retcode(2).with_console_out("boom");
        assert!(result.is_computed());
        assert!(!result.succeeded());
        assert_eq!(result.console_out.as_deref(), Some("boom"));
    }

    #[test]
    fn test_result_json_shape() {
        let result = JobResult::with_retcode(0).with_output("firings", "/out/firings.mda");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["retcode"], 0);
        assert_eq!(json["outputs"]["firings"], "/out/firings.mda");
        assert!(json.get("console_out").is_none());

        let parsed: JobResult = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn test_timing_since() {
        let started = Utc::now() - chrono::Duration::milliseconds(50);
        let timing = JobTiming::since(started);
        assert!(timing.elapsed_ms >= 50);
        assert!(timing.completed_at >= timing.started_at);
    }
}
