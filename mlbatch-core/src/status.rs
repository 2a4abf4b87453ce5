//! Job status lifecycle

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a job within a batch dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    /// Waiting to be dispatched
    Queued,
    /// Handed to a handler
    Running,
    /// Handler returned a zero return code
    Finished,
    /// Handler returned a non-zero return code
    Error,
    /// Handler produced no result at all
    ResultNotFound,
}

impl JobStatus {
    /// Check if the status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Error | JobStatus::ResultNotFound
        )
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self {
            JobStatus::Queued => next == JobStatus::Running,
            JobStatus::Running => next.is_terminal(),
            _ => false,
        }
    }

    /// Terminal status for a produced return code
    pub fn for_retcode(retcode: Option<i32>) -> Self {
        match retcode {
            Some(0) => JobStatus::Finished,
            _ => JobStatus::Error,
        }
    }

    /// Get the wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Error => "error",
            JobStatus::ResultNotFound => "result-not-found",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unknown status string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(pub String);

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown job status: {}", self.0)
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for JobStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "finished" => Ok(JobStatus::Finished),
            "error" => Ok(JobStatus::Error),
            "result-not-found" => Ok(JobStatus::ResultNotFound),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Finished));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Error));
        assert!(JobStatus::Running.can_transition_to(JobStatus::ResultNotFound));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Finished));
        assert!(!JobStatus::Finished.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Error.can_transition_to(JobStatus::Finished));
    }

    #[test]
    fn test_for_retcode() {
        assert_eq!(JobStatus::for_retcode(Some(0)), JobStatus::Finished);
        assert_eq!(JobStatus::for_retcode(Some(1)), JobStatus::Error);
        assert_eq!(JobStatus::for_retcode(Some(-1)), JobStatus::Error);
    }

    #[test]
    fn test_wire_format() {
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Finished,
            JobStatus::Error,
            JobStatus::ResultNotFound,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("done".parse::<JobStatus>().is_err());
    }
}
