//! Pipeline lifecycle status and per-stage log status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The lifecycle status of a pipeline.
///
/// `Created -> Running -> {Completed, Failed, Cancelled}`. `Paused` is a
/// reserved start state; nothing in the kernel transitions into it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStatus {
    /// Pipeline record exists, execution has not started.
    #[default]
    Created,
    /// Stages are executing.
    Running,
    /// Reserved: execution suspended and may be started again.
    Paused,
    /// Every stage succeeded.
    Completed,
    /// At least one stage failed.
    Failed,
    /// A cancellation request was processed before a terminal outcome.
    Cancelled,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "Running" => Ok(Self::Running),
            "Paused" => Ok(Self::Paused),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl PipelineStatus {
    /// Returns the persisted string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Running => "Running",
            Self::Paused => "Paused",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Returns true if the status is absorbing.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if a pipeline in this status may enter `Running`.
    #[must_use]
    pub const fn can_start(&self) -> bool {
        matches!(self, Self::Created | Self::Paused)
    }
}

/// Error returned when parsing an unrecognised status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pipeline status: {0}")]
pub struct UnknownStatus(pub String);

/// Outcome recorded in an execution log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogStatus {
    /// The stage returned an output.
    Completed,
    /// The stage returned an error (or was cancelled in flight).
    Failed,
    /// Written by the service when `execute` itself failed.
    Error,
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Which orchestrator variant drives a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Stages run one after another, output threaded into the next input.
    Sequential,
    /// Stages run concurrently on the same input.
    Parallel,
}

impl ExecutionMode {
    /// Maps the transport-level `is_parallel` flag onto a mode.
    #[must_use]
    pub const fn from_parallel_flag(is_parallel: bool) -> Self {
        if is_parallel {
            Self::Parallel
        } else {
            Self::Sequential
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            PipelineStatus::Created,
            PipelineStatus::Running,
            PipelineStatus::Paused,
            PipelineStatus::Completed,
            PipelineStatus::Failed,
            PipelineStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<PipelineStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_unknown_status() {
        let err = "Failed to Cancel".parse::<PipelineStatus>().unwrap_err();
        assert!(err.to_string().contains("Failed to Cancel"));
    }

    #[test]
    fn test_default_status_is_created() {
        assert_eq!(PipelineStatus::default(), PipelineStatus::Created);
    }

    #[test]
    fn test_terminal_and_startable() {
        assert!(PipelineStatus::Completed.is_terminal());
        assert!(PipelineStatus::Failed.is_terminal());
        assert!(PipelineStatus::Cancelled.is_terminal());
        assert!(!PipelineStatus::Running.is_terminal());

        assert!(PipelineStatus::Created.can_start());
        assert!(PipelineStatus::Paused.can_start());
        assert!(!PipelineStatus::Running.can_start());
        assert!(!PipelineStatus::Completed.can_start());
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&PipelineStatus::Cancelled).unwrap();
        assert_eq!(json, r#""Cancelled""#);
    }

    #[test]
    fn test_execution_mode_from_flag() {
        assert_eq!(ExecutionMode::from_parallel_flag(true), ExecutionMode::Parallel);
        assert_eq!(ExecutionMode::from_parallel_flag(false), ExecutionMode::Sequential);
        assert_eq!(ExecutionMode::Parallel.to_string(), "parallel");
    }
}
