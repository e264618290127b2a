//! Sequential orchestrator: chained stages with rollback on failure.

use super::state::OrchestratorState;
use super::ExecutionReport;
use crate::config::RollbackOrder;
use crate::context::RunContext;
use crate::core::{ExecutionMode, PipelineStatus};
use crate::errors::{KernelError, Result};
use crate::observability::SpanTimer;
use crate::stages::{Stage, StageOutcome};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A stage that completed, with the values it saw.
struct CompletedStage {
    stage: Arc<dyn Stage>,
    input: Value,
    output: Value,
}

/// Runs stages one after another, threading each output into the next input.
#[derive(Debug)]
pub struct SequentialOrchestrator {
    state: OrchestratorState,
}

impl SequentialOrchestrator {
    pub(crate) fn new(state: OrchestratorState) -> Self {
        Self { state }
    }

    pub(crate) fn state(&self) -> &OrchestratorState {
        &self.state
    }

    /// Executes every stage in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StageFailed` on the first failing stage (after rollback),
    /// `Cancelled` when a cancel is observed between stages or was recorded
    /// before the terminal status, and the validation errors of a refused
    /// start.
    pub async fn execute(
        &self,
        ctx: &RunContext,
        user_id: Uuid,
        pipeline_id: Uuid,
        input: Value,
    ) -> Result<ExecutionReport> {
        let (_guard, stages) = self.state.begin(pipeline_id)?;
        self.state.validate_user(user_id).await?;
        self.state.enter_running().await?;

        let timer = SpanTimer::start(format!("pipeline:{pipeline_id}"));
        let recorder = self.state.recorder();
        let check_cancellation = self.state.config().check_cancellation;
        let mut completed: Vec<CompletedStage> = Vec::with_capacity(stages.len());
        let mut current = input;

        for stage in &stages {
            if check_cancellation && self.state.cancel_token().is_cancelled() {
                info!(
                    pipeline_id = %pipeline_id,
                    completed = completed.len(),
                    "Cancellation observed"
                );
                self.rollback(ctx, user_id, &completed, &current).await;
                return Err(KernelError::Cancelled { pipeline_id });
            }

            let stage_id = stage.id();
            let stage_ctx = self.state.stage_context(user_id, stage_id, ctx);
            debug!(pipeline_id = %pipeline_id, stage_id = %stage_id, "Executing stage");
            recorder.started(stage_id);

            let started_at = Utc::now();
            let result = stage.execute(&stage_ctx, current.clone()).await;
            let outcome = StageOutcome::finish(stage_id, started_at, result);
            recorder.record(&outcome).await;

            match outcome.result {
                Ok(output) => {
                    let input = std::mem::replace(&mut current, output.clone());
                    completed.push(CompletedStage {
                        stage: Arc::clone(stage),
                        input,
                        output,
                    });
                }
                Err(err) => {
                    let handled = stage.handle_error(&stage_ctx, err).await;
                    self.rollback(ctx, user_id, &completed, &current).await;
                    if !self.state.finish(PipelineStatus::Failed).await? {
                        return Err(KernelError::Cancelled { pipeline_id });
                    }
                    return Err(KernelError::StageFailed {
                        stage_id,
                        message: handled.message,
                    });
                }
            }
        }

        if !self.state.finish(PipelineStatus::Completed).await? {
            self.rollback(ctx, user_id, &completed, &current).await;
            return Err(KernelError::Cancelled { pipeline_id });
        }

        Ok(ExecutionReport {
            pipeline_id,
            mode: ExecutionMode::Sequential,
            status: PipelineStatus::Completed,
            output: current,
            results: Vec::new(),
            stage_count: stages.len(),
            duration_ms: timer.finish(),
        })
    }

    async fn rollback(
        &self,
        ctx: &RunContext,
        user_id: Uuid,
        completed: &[CompletedStage],
        current: &Value,
    ) {
        if completed.is_empty() {
            return;
        }
        let order = self.state.config().rollback_order;
        info!(
            pipeline_id = %self.state.pipeline_id(),
            stages = completed.len(),
            order = %order,
            "Rolling back completed stages"
        );

        match order {
            RollbackOrder::Reverse => {
                for done in completed.iter().rev() {
                    self.rollback_one(ctx, user_id, &done.stage, &done.input, &done.output)
                        .await;
                }
            }
            RollbackOrder::Forward => {
                for done in completed {
                    self.rollback_one(ctx, user_id, &done.stage, current, current).await;
                }
            }
        }
    }

    async fn rollback_one(
        &self,
        ctx: &RunContext,
        user_id: Uuid,
        stage: &Arc<dyn Stage>,
        input: &Value,
        output: &Value,
    ) {
        let stage_ctx = self.state.stage_context(user_id, stage.id(), ctx);
        if let Err(e) = stage.rollback(&stage_ctx, input, output).await {
            warn!(
                pipeline_id = %self.state.pipeline_id(),
                stage_id = %stage.id(),
                error = %e,
                "Rollback failed"
            );
        }
    }
}
