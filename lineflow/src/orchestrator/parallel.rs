//! Parallel orchestrator: fan-out of independent stages, fan-in of results.

use super::state::OrchestratorState;
use super::ExecutionReport;
use crate::context::RunContext;
use crate::core::{ExecutionMode, PipelineStatus};
use crate::errors::{KernelError, Result, StageFailure};
use crate::observability::SpanTimer;
use crate::stages::{StageError, StageOutcome};
use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Message logged for stages interrupted by a cancel.
pub const CANCELLED_MESSAGE: &str = "pipeline cancelled";

#[derive(Debug, Default)]
struct Outcomes {
    results: Vec<Value>,
    failures: Vec<StageFailure>,
}

/// Runs every stage concurrently on a clone of the same input.
#[derive(Debug)]
pub struct ParallelOrchestrator {
    state: OrchestratorState,
}

impl ParallelOrchestrator {
    pub(crate) fn new(state: OrchestratorState) -> Self {
        Self { state }
    }

    pub(crate) fn state(&self) -> &OrchestratorState {
        &self.state
    }

    /// Executes every stage as its own task and joins them all.
    ///
    /// # Errors
    ///
    /// Returns `ParallelFailed` (carrying the successful results) when any
    /// stage failed, `NoResults` when nothing came back, and the validation
    /// errors of a refused start.
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
        let total = stages.len();
        let outcomes = Arc::new(Mutex::new(Outcomes::default()));
        let mut handles = Vec::with_capacity(total);
        let check_cancellation = self.state.config().check_cancellation;

        for stage in stages {
            let stage_id = stage.id();
            let stage_ctx = self.state.stage_context(user_id, stage_id, ctx);
            let recorder = self.state.recorder();
            let token = Arc::clone(self.state.cancel_token());
            let outcomes = Arc::clone(&outcomes);
            let input = input.clone();

            let handle = tokio::spawn(async move {
                debug!(pipeline_id = %pipeline_id, stage_id = %stage_id, "Executing stage");
                recorder.started(stage_id);
                let started_at = Utc::now();

                let result = if check_cancellation {
                    tokio::select! {
                        result = stage.execute(&stage_ctx, input) => result,
                        () = token.cancelled() => Err(StageError::new(CANCELLED_MESSAGE)),
                    }
                } else {
                    stage.execute(&stage_ctx, input).await
                };
                let outcome = StageOutcome::finish(stage_id, started_at, result);
                recorder.record(&outcome).await;

                match outcome.result {
                    Ok(output) => outcomes.lock().results.push(output),
                    Err(e) => outcomes
                        .lock()
                        .failures
                        .push(StageFailure::new(stage_id, e.message)),
                }
            });
            handles.push((stage_id, handle));
        }

        let joined = join_all(
            handles
                .into_iter()
                .map(|(stage_id, handle)| async move { (stage_id, handle.await) }),
        )
        .await;

        for (stage_id, joined) in joined {
            if let Err(e) = joined {
                let message = format!("stage task aborted: {e}");
                error!(
                    pipeline_id = %pipeline_id,
                    stage_id = %stage_id,
                    error = %e,
                    "Stage task aborted"
                );
                self.state.recorder().failed(stage_id, &message, 0.0).await;
                outcomes.lock().failures.push(StageFailure::new(stage_id, message));
            }
        }

        let Outcomes { results, failures } = std::mem::take(&mut *outcomes.lock());
        let status = if failures.is_empty() {
            PipelineStatus::Completed
        } else {
            PipelineStatus::Failed
        };
        let recorded = self.state.finish(status).await?;

        if !recorded {
            return Err(KernelError::Cancelled { pipeline_id });
        }
        if !failures.is_empty() {
            return Err(KernelError::ParallelFailed {
                failures,
                results,
                total,
            });
        }
        if results.is_empty() {
            return Err(KernelError::NoResults);
        }

        Ok(ExecutionReport {
            pipeline_id,
            mode: ExecutionMode::Parallel,
            status,
            output: Value::Array(results.clone()),
            results,
            stage_count: total,
            duration_ms: timer.finish(),
        })
    }
}
