//! Error types for the lineflow kernel.
//!
//! Errors fall into configuration, lookup, stage-execution, state-conflict
//! and persistence categories. Nothing in the kernel retries; every error
//! propagates once to the immediate caller.

use crate::core::PipelineStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// The main error type for kernel operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// The orchestrator holds no stages.
    #[error("no stages found for pipeline {pipeline_id}")]
    NoStages {
        /// The pipeline.
        pipeline_id: Uuid,
    },

    /// Stages cannot be added once execution has begun.
    #[error("stages of pipeline {pipeline_id} are locked: execution already started")]
    StagesLocked {
        /// The pipeline.
        pipeline_id: Uuid,
    },

    /// The owning user does not exist.
    #[error("user not found: {user_id}")]
    UserNotFound {
        /// The missing user.
        user_id: Uuid,
    },

    /// The state store has no record for the pipeline.
    #[error("pipeline not found: {pipeline_id}")]
    PipelineNotFound {
        /// The missing pipeline.
        pipeline_id: Uuid,
    },

    /// No live orchestrator is registered for the pipeline.
    #[error("orchestrator not initialized for pipeline {pipeline_id}")]
    OrchestratorNotInitialized {
        /// The pipeline.
        pipeline_id: Uuid,
    },

    /// A sequential stage failed; the chain was aborted and rolled back.
    #[error("stage {stage_id} failed: {message}")]
    StageFailed {
        /// The failing stage.
        stage_id: Uuid,
        /// The error returned by the stage's error handler.
        message: String,
    },

    /// One or more parallel stages failed. Successful results are kept.
    #[error("{} of {total} parallel stages failed", .failures.len())]
    ParallelFailed {
        /// Every failure, in completion order.
        failures: Vec<StageFailure>,
        /// Outputs of the stages that succeeded.
        results: Vec<serde_json::Value>,
        /// Number of stages launched.
        total: usize,
    },

    /// Parallel execution produced neither results nor errors.
    #[error("no valid results from pipeline stages")]
    NoResults,

    /// Execution stopped because the pipeline was cancelled.
    #[error("pipeline {pipeline_id} cancelled")]
    Cancelled {
        /// The pipeline.
        pipeline_id: Uuid,
    },

    /// Cancel was requested on a completed pipeline.
    #[error("cannot cancel a completed pipeline: {pipeline_id}")]
    AlreadyCompleted {
        /// The pipeline.
        pipeline_id: Uuid,
    },

    /// Execute was invoked while another execution is in flight.
    #[error("pipeline {pipeline_id} is already running")]
    AlreadyRunning {
        /// The pipeline.
        pipeline_id: Uuid,
    },

    /// The persisted status does not allow starting.
    #[error("invalid pipeline status: {status}")]
    InvalidStatus {
        /// The pipeline.
        pipeline_id: Uuid,
        /// The status found.
        status: PipelineStatus,
    },

    /// The requested transition leaves a terminal status.
    #[error("invalid transition for pipeline {pipeline_id}: {from} -> {to}")]
    InvalidTransition {
        /// The pipeline.
        pipeline_id: Uuid,
        /// Current status.
        from: PipelineStatus,
        /// Requested status.
        to: PipelineStatus,
    },

    /// A repository call failed.
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl KernelError {
    /// Returns the failing stage, when the error carries one.
    #[must_use]
    pub fn failing_stage(&self) -> Option<Uuid> {
        match self {
            Self::StageFailed { stage_id, .. } => Some(*stage_id),
            Self::ParallelFailed { failures, .. } => failures.first().map(|f| f.stage_id),
            _ => None,
        }
    }

    /// Returns a stable machine-readable code for transport adapters.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoStages { .. } => "NO_STAGES",
            Self::StagesLocked { .. } => "STAGES_LOCKED",
            Self::UserNotFound { .. } => "USER_NOT_FOUND",
            Self::PipelineNotFound { .. } => "PIPELINE_NOT_FOUND",
            Self::OrchestratorNotInitialized { .. } => "ORCHESTRATOR_NOT_INITIALIZED",
            Self::StageFailed { .. } => "STAGE_FAILED",
            Self::ParallelFailed { .. } => "PARALLEL_FAILED",
            Self::NoResults => "NO_RESULTS",
            Self::Cancelled { .. } => "CANCELLED",
            Self::AlreadyCompleted { .. } => "ALREADY_COMPLETED",
            Self::AlreadyRunning { .. } => "ALREADY_RUNNING",
            Self::InvalidStatus { .. } => "INVALID_STATUS",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Repository(_) => "REPOSITORY",
            Self::Config(_) => "CONFIG",
        }
    }

    /// Returns true for state-transition conflicts.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyCompleted { .. }
                | Self::AlreadyRunning { .. }
                | Self::InvalidStatus { .. }
                | Self::InvalidTransition { .. }
        )
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Some(stage_id) = self.failing_stage() {
            map.insert("stage_id".to_string(), serde_json::json!(stage_id.to_string()));
        }
        map
    }
}

/// A single failed stage inside a parallel run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    /// The stage.
    pub stage_id: Uuid,
    /// Its error message.
    pub message: String,
}

impl StageFailure {
    /// Creates a new stage failure.
    #[must_use]
    pub fn new(stage_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            stage_id,
            message: message.into(),
        }
    }
}

/// Errors raised by repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// No pipeline record for the identity.
    #[error("pipeline record not found: {0}")]
    NotFound(Uuid),

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl RepositoryError {
    /// Creates a storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

/// Result alias for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failing_stage_sequential() {
        let stage_id = Uuid::new_v4();
        let err = KernelError::StageFailed {
            stage_id,
            message: "boom".to_string(),
        };

        assert_eq!(err.failing_stage(), Some(stage_id));
        assert_eq!(err.code(), "STAGE_FAILED");
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_failing_stage_parallel() {
        let first = Uuid::new_v4();
        let err = KernelError::ParallelFailed {
            failures: vec![StageFailure::new(first, "a"), StageFailure::new(Uuid::new_v4(), "b")],
            results: vec![serde_json::json!(1)],
            total: 3,
        };

        assert_eq!(err.failing_stage(), Some(first));
        assert_eq!(err.to_string(), "2 of 3 parallel stages failed");
    }

    #[test]
    fn test_conflicts() {
        let id = Uuid::new_v4();
        assert!(KernelError::AlreadyCompleted { pipeline_id: id }.is_conflict());
        assert!(KernelError::InvalidStatus {
            pipeline_id: id,
            status: PipelineStatus::Running,
        }
        .is_conflict());
        assert!(!KernelError::NoResults.is_conflict());
    }

    #[test]
    fn test_repository_error_conversion() {
        let err: KernelError = RepositoryError::storage("disk full").into();
        assert_eq!(err.code(), "REPOSITORY");
        assert_eq!(err.to_string(), "storage error: disk full");
    }

    #[test]
    fn test_to_dict() {
        let id = Uuid::new_v4();
        let dict = KernelError::UserNotFound { user_id: id }.to_dict();
        assert_eq!(dict.get("code").unwrap(), "USER_NOT_FOUND");
        assert!(dict.get("stage_id").is_none());
    }
}
