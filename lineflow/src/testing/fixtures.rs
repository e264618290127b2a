//! Test fixtures for pipeline testing.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::KernelConfig;
use crate::core::{ExecutionLogEntry, LogStatus, PipelineStatus, User};
use crate::events::CollectingBroadcaster;
use crate::ports::InMemoryRepository;
use crate::service::PipelineService;

/// A service wired to an in-memory repository and a collecting broadcaster,
/// with one registered user.
#[derive(Debug)]
pub struct TestHarness {
    /// The repository backing the service.
    pub repository: Arc<InMemoryRepository>,
    /// Every event the service broadcast.
    pub broadcaster: Arc<CollectingBroadcaster>,
    /// The service under test.
    pub service: PipelineService,
    user_id: Uuid,
}

impl TestHarness {
    /// Creates a harness with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    /// Creates a harness with an explicit configuration.
    #[must_use]
    pub fn with_config(config: KernelConfig) -> Self {
        let repository = Arc::new(InMemoryRepository::new());
        let broadcaster = Arc::new(CollectingBroadcaster::new());
        let user_id = repository.save_user(User::new("Test Operator", "operator@example.com"));
        let service = PipelineService::with_config(repository.clone(), broadcaster.clone(), config);

        Self {
            repository,
            broadcaster,
            service,
            user_id,
        }
    }

    /// Returns the registered user.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Returns the persisted status, if the pipeline has a record.
    #[must_use]
    pub fn stored_status(&self, pipeline_id: Uuid) -> Option<PipelineStatus> {
        self.repository.record(pipeline_id).map(|r| r.status)
    }

    /// Returns the pipeline-level statuses broadcast so far.
    #[must_use]
    pub fn broadcast_statuses(&self, pipeline_id: Uuid) -> Vec<PipelineStatus> {
        self.broadcaster.pipeline_statuses(pipeline_id)
    }

    /// Returns the execution log of a pipeline.
    #[must_use]
    pub fn logs(&self, pipeline_id: Uuid) -> Vec<ExecutionLogEntry> {
        self.repository.logs_for(pipeline_id)
    }

    /// Counts the log entries of a pipeline with the given status.
    #[must_use]
    pub fn log_count(&self, pipeline_id: Uuid, status: LogStatus) -> usize {
        self.logs(pipeline_id)
            .iter()
            .filter(|e| e.status == status)
            .count()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
