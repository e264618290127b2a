//! Pipeline service: the single entry point for transport adapters.
//!
//! The service creates orchestrators, keeps them in a [`PipelineRegistry`],
//! and delegates start, status and cancel requests to them.

mod registry;

pub use registry::PipelineRegistry;

use crate::config::{EvictionPolicy, KernelConfig};
use crate::context::RunContext;
use crate::core::{ExecutionLogEntry, ExecutionMode, PipelineEvent, PipelineRecord, PipelineStatus};
use crate::errors::{KernelError, RepositoryError, Result};
use crate::events::EventBroadcaster;
use crate::orchestrator::{ExecutionReport, Orchestrator};
use crate::ports::PipelineRepository;
use crate::stages::{BaseStage, Stage};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Creates, runs, inspects and cancels pipelines.
#[derive(Clone)]
pub struct PipelineService {
    repository: Arc<dyn PipelineRepository>,
    broadcaster: Arc<dyn EventBroadcaster>,
    registry: Arc<PipelineRegistry>,
    config: KernelConfig,
}

impl std::fmt::Debug for PipelineService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineService")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PipelineService {
    /// Creates a service with the default configuration.
    #[must_use]
    pub fn new(
        repository: Arc<dyn PipelineRepository>,
        broadcaster: Arc<dyn EventBroadcaster>,
    ) -> Self {
        Self::with_config(repository, broadcaster, KernelConfig::default())
    }

    /// Creates a service with an explicit configuration.
    #[must_use]
    pub fn with_config(
        repository: Arc<dyn PipelineRepository>,
        broadcaster: Arc<dyn EventBroadcaster>,
        config: KernelConfig,
    ) -> Self {
        let registry = Arc::new(PipelineRegistry::new(config.eviction));
        Self::with_registry(repository, broadcaster, registry, config)
    }

    /// Creates a service around an injected registry.
    ///
    /// The registry's own eviction policy wins over `config.eviction`.
    #[must_use]
    pub fn with_registry(
        repository: Arc<dyn PipelineRepository>,
        broadcaster: Arc<dyn EventBroadcaster>,
        registry: Arc<PipelineRegistry>,
        config: KernelConfig,
    ) -> Self {
        Self {
            repository,
            broadcaster,
            registry,
            config,
        }
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<PipelineRegistry> {
        &self.registry
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Creates a pipeline of `stage_count` passthrough stages.
    ///
    /// A count of zero is accepted; such a pipeline is refused at start.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the `Created` record cannot be saved.
    pub async fn create_pipeline(
        &self,
        user_id: Uuid,
        stage_count: usize,
        mode: ExecutionMode,
    ) -> Result<Uuid> {
        let stages: Vec<Arc<dyn Stage>> = (0..stage_count)
            .map(|_| Arc::new(BaseStage::new()) as Arc<dyn Stage>)
            .collect();
        self.create_pipeline_with_stages(user_id, stages, mode).await
    }

    /// Creates a pipeline from caller-supplied stages.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the `Created` record cannot be saved.
    pub async fn create_pipeline_with_stages(
        &self,
        user_id: Uuid,
        stages: Vec<Arc<dyn Stage>>,
        mode: ExecutionMode,
    ) -> Result<Uuid> {
        let pipeline_id = Uuid::new_v4();
        let orchestrator = Orchestrator::new(
            mode,
            pipeline_id,
            Arc::clone(&self.repository),
            Arc::clone(&self.broadcaster),
            self.config.clone(),
        );
        let stage_count = stages.len();
        for stage in stages {
            orchestrator.add_stage(stage)?;
        }

        self.repository
            .save_pipeline_execution(PipelineRecord::created(pipeline_id, user_id))
            .await?;
        self.broadcaster
            .broadcast_update(&PipelineEvent::pipeline(pipeline_id, PipelineStatus::Created));
        self.registry.insert(Arc::new(orchestrator));

        info!(
            pipeline_id = %pipeline_id,
            user_id = %user_id,
            mode = %mode,
            stage_count,
            "Pipeline created"
        );
        Ok(pipeline_id)
    }

    fn lookup(&self, pipeline_id: Uuid) -> Result<Arc<Orchestrator>> {
        self.registry
            .get(pipeline_id)
            .ok_or(KernelError::OrchestratorNotInitialized { pipeline_id })
    }

    /// Starts a pipeline and waits for its terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorNotInitialized`, `InvalidStatus` or `NoStages`
    /// when the start is refused, and any execution error otherwise.
    pub async fn start_pipeline(
        &self,
        ctx: &RunContext,
        user_id: Uuid,
        pipeline_id: Uuid,
        input: Value,
    ) -> Result<ExecutionReport> {
        let orchestrator = self.lookup(pipeline_id)?;

        let status = orchestrator.get_status().await?;
        if !status.can_start() {
            return Err(KernelError::InvalidStatus { pipeline_id, status });
        }
        if orchestrator.stage_count() == 0 {
            return Err(KernelError::NoStages { pipeline_id });
        }

        info!(
            pipeline_id = %pipeline_id,
            user_id = %user_id,
            mode = %orchestrator.mode(),
            "Starting pipeline"
        );
        let result = orchestrator.execute(ctx, user_id, pipeline_id, input).await;

        match &result {
            Ok(report) => {
                info!(
                    pipeline_id = %pipeline_id,
                    duration_ms = report.duration_ms,
                    "Pipeline completed"
                );
            }
            Err(e) => {
                warn!(
                    pipeline_id = %pipeline_id,
                    error = %e,
                    code = e.code(),
                    "Pipeline execution failed"
                );
                self.log_execution_error(pipeline_id, e).await;
            }
        }

        if self.registry.policy() == EvictionPolicy::OnTerminal
            && has_terminal_status(&orchestrator).await
            && self.registry.evict_terminal(pipeline_id)
        {
            info!(pipeline_id = %pipeline_id, "Orchestrator evicted");
        }
        result
    }

    /// Starts a pipeline on a detached task.
    #[must_use]
    pub fn spawn_start_pipeline(
        &self,
        ctx: RunContext,
        user_id: Uuid,
        pipeline_id: Uuid,
        input: Value,
    ) -> JoinHandle<Result<ExecutionReport>> {
        let service = self.clone();
        tokio::spawn(async move { service.start_pipeline(&ctx, user_id, pipeline_id, input).await })
    }

    /// Returns the persisted status of a pipeline.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorNotInitialized` for unknown pipelines. Under the
    /// `OnTerminal` eviction policy evicted pipelines are read from the store.
    pub async fn get_pipeline_status(&self, pipeline_id: Uuid) -> Result<PipelineStatus> {
        if let Some(orchestrator) = self.registry.get(pipeline_id) {
            return orchestrator.get_status().await;
        }
        match self.registry.policy() {
            EvictionPolicy::Retain => Err(KernelError::OrchestratorNotInitialized { pipeline_id }),
            EvictionPolicy::OnTerminal => self.stored_status(pipeline_id).await,
        }
    }

    /// Cancels a pipeline.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyCompleted` for a completed pipeline,
    /// `InvalidTransition` for other terminal statuses and
    /// `OrchestratorNotInitialized` for unknown pipelines.
    pub async fn cancel_pipeline(&self, pipeline_id: Uuid, user_id: Uuid) -> Result<()> {
        let Some(orchestrator) = self.registry.get(pipeline_id) else {
            return self.cancel_evicted(pipeline_id).await;
        };

        orchestrator.cancel(user_id).await?;
        info!(pipeline_id = %pipeline_id, user_id = %user_id, "Pipeline cancelled");

        // A running execution evicts on its own way out.
        if !orchestrator.is_running() && self.registry.evict_terminal(pipeline_id) {
            info!(pipeline_id = %pipeline_id, "Orchestrator evicted");
        }
        Ok(())
    }

    /// Lists every pipeline owned by a user.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the query fails.
    pub async fn get_pipelines_by_user(&self, user_id: Uuid) -> Result<Vec<PipelineRecord>> {
        Ok(self.repository.get_pipelines_by_user(user_id).await?)
    }

    /// Lists the execution log of a pipeline.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the query fails.
    pub async fn get_pipeline_stages(&self, pipeline_id: Uuid) -> Result<Vec<ExecutionLogEntry>> {
        Ok(self.repository.get_pipeline_stages(pipeline_id).await?)
    }

    /// Removes a pipeline's orchestrator from the registry.
    ///
    /// Returns true if one was registered.
    pub fn evict(&self, pipeline_id: Uuid) -> bool {
        self.registry.remove(pipeline_id).is_some()
    }

    async fn stored_status(&self, pipeline_id: Uuid) -> Result<PipelineStatus> {
        self.repository
            .get_pipeline_status(pipeline_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => {
                    KernelError::OrchestratorNotInitialized { pipeline_id }
                }
                other => KernelError::Repository(other),
            })
    }

    async fn cancel_evicted(&self, pipeline_id: Uuid) -> Result<()> {
        if self.registry.policy() == EvictionPolicy::Retain {
            return Err(KernelError::OrchestratorNotInitialized { pipeline_id });
        }
        match self.stored_status(pipeline_id).await? {
            PipelineStatus::Completed => Err(KernelError::AlreadyCompleted { pipeline_id }),
            from if from.is_terminal() => Err(KernelError::InvalidTransition {
                pipeline_id,
                from,
                to: PipelineStatus::Cancelled,
            }),
            _ => Err(KernelError::OrchestratorNotInitialized { pipeline_id }),
        }
    }

    async fn log_execution_error(&self, pipeline_id: Uuid, error: &KernelError) {
        let entry = ExecutionLogEntry::error(pipeline_id, error.failing_stage(), error.to_string());
        if let Err(e) = self.repository.save_execution_log(entry).await {
            warn!(pipeline_id = %pipeline_id, error = %e, "Failed to log execution error");
        }
    }
}

/// Returns true if the pipeline's persisted status is terminal.
async fn has_terminal_status(orchestrator: &Orchestrator) -> bool {
    match orchestrator.get_status().await {
        Ok(status) => status.is_terminal(),
        Err(e) => {
            warn!(
                pipeline_id = %orchestrator.id(),
                error = %e,
                "Failed to read status for eviction"
            );
            false
        }
    }
}
