//! State shared by both orchestrator variants.
//!
//! Owns the stage list, the run guards, the cancellation token and the
//! transition lock that orders terminal writes against `cancel`.

use crate::cancellation::CancellationToken;
use crate::config::KernelConfig;
use crate::context::{RunContext, StageContext};
use crate::core::{ExecutionLogEntry, PipelineEvent, PipelineStatus, StatusUpdate};
use crate::errors::{KernelError, RepositoryError, Result};
use crate::events::EventBroadcaster;
use crate::ports::PipelineRepository;
use crate::stages::{Stage, StageOutcome};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Writes per-stage log entries and stage events.
///
/// Cheap to clone so parallel stage tasks can own one.
#[derive(Clone)]
pub(crate) struct StageRecorder {
    pipeline_id: Uuid,
    repository: Arc<dyn PipelineRepository>,
    broadcaster: Arc<dyn EventBroadcaster>,
}

impl StageRecorder {
    pub(crate) fn started(&self, stage_id: Uuid) {
        self.broadcaster.broadcast_update(&PipelineEvent::stage(
            self.pipeline_id,
            stage_id,
            PipelineStatus::Running,
        ));
    }

    /// Logs and broadcasts the outcome of one stage attempt.
    pub(crate) async fn record(&self, outcome: &StageOutcome) {
        match &outcome.result {
            Ok(_) => self.completed(outcome.stage_id, outcome.duration_ms()).await,
            Err(e) => {
                self.failed(outcome.stage_id, &e.message, outcome.duration_ms())
                    .await;
            }
        }
    }

    async fn completed(&self, stage_id: Uuid, duration_ms: f64) {
        info!(
            pipeline_id = %self.pipeline_id,
            stage_id = %stage_id,
            duration_ms,
            "Stage completed"
        );
        self.append_log(ExecutionLogEntry::completed(self.pipeline_id, stage_id))
            .await;
        self.broadcaster.broadcast_update(&PipelineEvent::stage(
            self.pipeline_id,
            stage_id,
            PipelineStatus::Completed,
        ));
    }

    pub(crate) async fn failed(&self, stage_id: Uuid, message: &str, duration_ms: f64) {
        warn!(
            pipeline_id = %self.pipeline_id,
            stage_id = %stage_id,
            duration_ms,
            error = %message,
            "Stage failed"
        );
        self.append_log(ExecutionLogEntry::failed(self.pipeline_id, stage_id, message))
            .await;
        self.broadcaster.broadcast_update(&PipelineEvent::stage(
            self.pipeline_id,
            stage_id,
            PipelineStatus::Failed,
        ));
    }

    async fn append_log(&self, entry: ExecutionLogEntry) {
        let stage_id = entry.stage_id;
        if let Err(e) = self.repository.save_execution_log(entry).await {
            warn!(
                pipeline_id = %self.pipeline_id,
                stage_id = %stage_id,
                error = %e,
                "Failed to save execution log"
            );
        }
    }
}

/// Clears the running flag when an execution attempt ends, however it ends.
pub(crate) struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

pub(crate) struct OrchestratorState {
    pipeline_id: Uuid,
    stages: Mutex<Vec<Arc<dyn Stage>>>,
    locked: AtomicBool,
    running: AtomicBool,
    cancel_token: Arc<CancellationToken>,
    transition_lock: tokio::sync::Mutex<()>,
    repository: Arc<dyn PipelineRepository>,
    broadcaster: Arc<dyn EventBroadcaster>,
    config: KernelConfig,
}

impl fmt::Debug for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorState")
            .field("pipeline_id", &self.pipeline_id)
            .field("stage_count", &self.stage_count())
            .field("running", &self.running.load(Ordering::Relaxed))
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish()
    }
}

impl OrchestratorState {
    pub(crate) fn new(
        pipeline_id: Uuid,
        repository: Arc<dyn PipelineRepository>,
        broadcaster: Arc<dyn EventBroadcaster>,
        config: KernelConfig,
    ) -> Self {
        Self {
            pipeline_id,
            stages: Mutex::new(Vec::new()),
            locked: AtomicBool::new(false),
            running: AtomicBool::new(false),
            cancel_token: Arc::new(CancellationToken::new()),
            transition_lock: tokio::sync::Mutex::new(()),
            repository,
            broadcaster,
            config,
        }
    }

    pub(crate) fn pipeline_id(&self) -> Uuid {
        self.pipeline_id
    }

    pub(crate) fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub(crate) fn cancel_token(&self) -> &Arc<CancellationToken> {
        &self.cancel_token
    }

    pub(crate) fn add_stage(&self, stage: Arc<dyn Stage>) -> Result<()> {
        let mut stages = self.stages.lock();
        if self.locked.load(Ordering::SeqCst) {
            return Err(KernelError::StagesLocked {
                pipeline_id: self.pipeline_id,
            });
        }
        stages.push(stage);
        Ok(())
    }

    pub(crate) fn stage_count(&self) -> usize {
        self.stages.lock().len()
    }

    pub(crate) fn stage_ids(&self) -> Vec<Uuid> {
        self.stages.lock().iter().map(|s| s.id()).collect()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Claims the orchestrator for one execution and freezes its stage list.
    pub(crate) fn begin(
        &self,
        pipeline_id: Uuid,
    ) -> Result<(RunGuard<'_>, Vec<Arc<dyn Stage>>)> {
        if pipeline_id != self.pipeline_id {
            return Err(KernelError::OrchestratorNotInitialized { pipeline_id });
        }

        let stages = self.stages.lock();
        if stages.is_empty() {
            return Err(KernelError::NoStages { pipeline_id });
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(KernelError::AlreadyRunning { pipeline_id });
        }
        self.locked.store(true, Ordering::SeqCst);

        Ok((RunGuard { running: &self.running }, stages.to_vec()))
    }

    pub(crate) async fn validate_user(&self, user_id: Uuid) -> Result<()> {
        match self.repository.get_user_by_id(user_id).await? {
            Some(_) => Ok(()),
            None => Err(KernelError::UserNotFound { user_id }),
        }
    }

    pub(crate) async fn read_status(&self) -> Result<PipelineStatus> {
        self.repository
            .get_pipeline_status(self.pipeline_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(pipeline_id) => {
                    KernelError::PipelineNotFound { pipeline_id }
                }
                other => KernelError::Repository(other),
            })
    }

    /// Checks the persisted status and records `Running`.
    pub(crate) async fn enter_running(&self) -> Result<()> {
        let _transition = self.transition_lock.lock().await;

        let status = self.read_status().await?;
        if !status.can_start() {
            return Err(KernelError::InvalidStatus {
                pipeline_id: self.pipeline_id,
                status,
            });
        }
        if self.cancel_token.is_cancelled() {
            return Err(KernelError::Cancelled {
                pipeline_id: self.pipeline_id,
            });
        }

        self.transition(PipelineStatus::Running).await
    }

    /// Records a terminal status unless a cancel got there first.
    ///
    /// Returns false when the write was skipped.
    pub(crate) async fn finish(&self, status: PipelineStatus) -> Result<bool> {
        let _transition = self.transition_lock.lock().await;

        if self.cancel_token.is_cancelled() {
            info!(
                pipeline_id = %self.pipeline_id,
                skipped = %status,
                "Pipeline cancelled, terminal status left as Cancelled"
            );
            return Ok(false);
        }

        self.transition(status).await?;
        Ok(true)
    }

    pub(crate) async fn cancel(&self, user_id: Uuid) -> Result<()> {
        let _transition = self.transition_lock.lock().await;

        info!(pipeline_id = %self.pipeline_id, user_id = %user_id, "Cancelling pipeline");
        let status = self.read_status().await?;
        match status {
            PipelineStatus::Completed => {
                return Err(KernelError::AlreadyCompleted {
                    pipeline_id: self.pipeline_id,
                })
            }
            from if from.is_terminal() => {
                return Err(KernelError::InvalidTransition {
                    pipeline_id: self.pipeline_id,
                    from,
                    to: PipelineStatus::Cancelled,
                })
            }
            _ => {}
        }

        self.cancel_token.cancel(format!("cancelled by user {user_id}"));
        self.transition(PipelineStatus::Cancelled).await
    }

    /// Persists a status change, then broadcasts it.
    async fn transition(&self, status: PipelineStatus) -> Result<()> {
        self.repository
            .update_pipeline_execution(StatusUpdate::now(self.pipeline_id, status))
            .await?;
        info!(pipeline_id = %self.pipeline_id, status = %status, "Pipeline status changed");
        self.broadcaster
            .broadcast_update(&PipelineEvent::pipeline(self.pipeline_id, status));
        Ok(())
    }

    pub(crate) fn stage_context(
        &self,
        user_id: Uuid,
        stage_id: Uuid,
        run: &RunContext,
    ) -> StageContext {
        StageContext::new(
            self.pipeline_id,
            user_id,
            stage_id,
            run.clone(),
            self.cancel_token.clone(),
        )
    }

    pub(crate) fn recorder(&self) -> StageRecorder {
        StageRecorder {
            pipeline_id: self.pipeline_id,
            repository: self.repository.clone(),
            broadcaster: self.broadcaster.clone(),
        }
    }
}
