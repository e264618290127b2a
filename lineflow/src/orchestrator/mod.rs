//! Pipeline orchestrators.
//!
//! This module provides:
//! - [`SequentialOrchestrator`]: chained stages with rollback on failure
//! - [`ParallelOrchestrator`]: independent stages joined into a result set
//! - [`Orchestrator`]: the sum type the service registers per pipeline
//!
//! Both variants persist `Running` and exactly one terminal status per
//! execution, each write followed by a broadcast.

mod parallel;
mod sequential;
mod state;

pub use parallel::{ParallelOrchestrator, CANCELLED_MESSAGE};
pub use sequential::SequentialOrchestrator;

use crate::cancellation::CancellationToken;
use crate::config::KernelConfig;
use crate::context::RunContext;
use crate::core::{ExecutionMode, PipelineStatus};
use crate::errors::Result;
use crate::events::EventBroadcaster;
use crate::ports::PipelineRepository;
use crate::stages::Stage;
use serde::Serialize;
use serde_json::Value;
use state::OrchestratorState;
use std::sync::Arc;
use uuid::Uuid;

/// What a successful execution produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    /// The pipeline.
    pub pipeline_id: Uuid,
    /// The variant that ran.
    pub mode: ExecutionMode,
    /// Terminal status recorded for the run.
    pub status: PipelineStatus,
    /// Final output: the last stage's output (sequential) or the array of
    /// results (parallel).
    pub output: Value,
    /// Individual parallel results in completion order. Empty for sequential runs.
    pub results: Vec<Value>,
    /// Number of stages executed.
    pub stage_count: usize,
    /// Wall time of the run in milliseconds.
    pub duration_ms: f64,
}

impl ExecutionReport {
    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// An orchestrator for one pipeline instance.
#[derive(Debug)]
pub enum Orchestrator {
    /// Stages run in order.
    Sequential(SequentialOrchestrator),
    /// Stages run concurrently.
    Parallel(ParallelOrchestrator),
}

impl Orchestrator {
    /// Creates an empty orchestrator of the given variant.
    #[must_use]
    pub fn new(
        mode: ExecutionMode,
        pipeline_id: Uuid,
        repository: Arc<dyn PipelineRepository>,
        broadcaster: Arc<dyn EventBroadcaster>,
        config: KernelConfig,
    ) -> Self {
        let state = OrchestratorState::new(pipeline_id, repository, broadcaster, config);
        match mode {
            ExecutionMode::Sequential => Self::Sequential(SequentialOrchestrator::new(state)),
            ExecutionMode::Parallel => Self::Parallel(ParallelOrchestrator::new(state)),
        }
    }

    fn state(&self) -> &OrchestratorState {
        match self {
            Self::Sequential(o) => o.state(),
            Self::Parallel(o) => o.state(),
        }
    }

    /// Returns the pipeline identity.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.state().pipeline_id()
    }

    /// Returns the variant.
    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        match self {
            Self::Sequential(_) => ExecutionMode::Sequential,
            Self::Parallel(_) => ExecutionMode::Parallel,
        }
    }

    /// Appends a stage.
    ///
    /// # Errors
    ///
    /// Returns `StagesLocked` once execution has begun.
    pub fn add_stage(&self, stage: Arc<dyn Stage>) -> Result<()> {
        self.state().add_stage(stage)
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.state().stage_count()
    }

    /// Returns the stage identities in insertion order.
    #[must_use]
    pub fn stage_ids(&self) -> Vec<Uuid> {
        self.state().stage_ids()
    }

    /// Returns true while an execution is in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Returns the cancellation token shared with every stage invocation.
    #[must_use]
    pub fn cancel_token(&self) -> Arc<CancellationToken> {
        Arc::clone(self.state().cancel_token())
    }

    /// Runs the pipeline.
    ///
    /// # Errors
    ///
    /// See [`SequentialOrchestrator::execute`] and [`ParallelOrchestrator::execute`].
    pub async fn execute(
        &self,
        ctx: &RunContext,
        user_id: Uuid,
        pipeline_id: Uuid,
        input: Value,
    ) -> Result<ExecutionReport> {
        match self {
            Self::Sequential(o) => o.execute(ctx, user_id, pipeline_id, input).await,
            Self::Parallel(o) => o.execute(ctx, user_id, pipeline_id, input).await,
        }
    }

    /// Reads the persisted status.
    ///
    /// # Errors
    ///
    /// Returns `PipelineNotFound` if the state store has no record.
    pub async fn get_status(&self) -> Result<PipelineStatus> {
        self.state().read_status().await
    }

    /// Cancels the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyCompleted` for a completed pipeline and
    /// `InvalidTransition` for any other terminal status.
    pub async fn cancel(&self, user_id: Uuid) -> Result<()> {
        self.state().cancel(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PipelineRecord;
    use crate::errors::KernelError;
    use crate::events::CollectingBroadcaster;
    use crate::ports::InMemoryRepository;
    use crate::stages::BaseStage;

    fn orchestrator(mode: ExecutionMode) -> (Orchestrator, Arc<InMemoryRepository>) {
        let repo = Arc::new(InMemoryRepository::new());
        let orch = Orchestrator::new(
            mode,
            Uuid::new_v4(),
            repo.clone(),
            Arc::new(CollectingBroadcaster::new()),
            KernelConfig::default(),
        );
        (orch, repo)
    }

    #[test]
    fn test_mode_selects_variant() {
        let (seq, _) = orchestrator(ExecutionMode::Sequential);
        let (par, _) = orchestrator(ExecutionMode::Parallel);

        assert!(matches!(seq, Orchestrator::Sequential(_)));
        assert_eq!(par.mode(), ExecutionMode::Parallel);
    }

    #[test]
    fn test_add_stage_preserves_order() {
        let (orch, _) = orchestrator(ExecutionMode::Sequential);
        let a = BaseStage::new();
        let b = BaseStage::new();
        let ids = vec![a.id(), b.id()];

        orch.add_stage(Arc::new(a)).unwrap();
        orch.add_stage(Arc::new(b)).unwrap();

        assert_eq!(orch.stage_count(), 2);
        assert_eq!(orch.stage_ids(), ids);
    }

    #[tokio::test]
    async fn test_execute_without_stages() {
        let (orch, _) = orchestrator(ExecutionMode::Sequential);
        let err = orch
            .execute(&RunContext::new(), Uuid::new_v4(), orch.id(), Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, KernelError::NoStages { .. }));
    }

    #[tokio::test]
    async fn test_execute_wrong_pipeline_id() {
        let (orch, _) = orchestrator(ExecutionMode::Parallel);
        orch.add_stage(Arc::new(BaseStage::new())).unwrap();

        let err = orch
            .execute(&RunContext::new(), Uuid::new_v4(), Uuid::new_v4(), Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, KernelError::OrchestratorNotInitialized { .. }));
    }

    #[tokio::test]
    async fn test_stages_locked_after_execution_begins() {
        let (orch, repo) = orchestrator(ExecutionMode::Sequential);
        orch.add_stage(Arc::new(BaseStage::new())).unwrap();
        repo.save_pipeline_execution(PipelineRecord::created(orch.id(), Uuid::new_v4()))
            .await
            .unwrap();

        // The user does not exist, but the stage list is frozen anyway.
        let err = orch
            .execute(&RunContext::new(), Uuid::new_v4(), orch.id(), Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, KernelError::UserNotFound { .. }));
        assert!(!orch.is_running());

        let err = orch.add_stage(Arc::new(BaseStage::new())).unwrap_err();
        assert!(matches!(err, KernelError::StagesLocked { .. }));
    }

    #[tokio::test]
    async fn test_status_of_unknown_pipeline() {
        let (orch, _) = orchestrator(ExecutionMode::Sequential);
        let err = orch.get_status().await.unwrap_err();
        assert!(matches!(err, KernelError::PipelineNotFound { .. }));
    }

    #[test]
    fn test_report_to_dict() {
        let report = ExecutionReport {
            pipeline_id: Uuid::nil(),
            mode: ExecutionMode::Parallel,
            status: PipelineStatus::Completed,
            output: serde_json::json!(["a"]),
            results: vec![serde_json::json!("a")],
            stage_count: 1,
            duration_ms: 1.5,
        };
        let dict = report.to_dict();
        assert_eq!(dict["mode"], "parallel");
        assert_eq!(dict["status"], "Completed");
    }
}
