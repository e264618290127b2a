//! In-memory repository adapter.

use super::PipelineRepository;
use crate::core::{ExecutionLogEntry, PipelineRecord, PipelineStatus, StatusUpdate, User};
use crate::errors::RepositoryError;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

/// A repository that keeps everything in process memory.
///
/// Used by tests and by embedding hosts that do not need durability.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    pipelines: DashMap<Uuid, PipelineRecord>,
    users: DashMap<Uuid, User>,
    logs: RwLock<Vec<ExecutionLogEntry>>,
}

impl InMemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a user and returns its id.
    pub fn save_user(&self, user: User) -> Uuid {
        let user_id = user.user_id;
        self.users.insert(user_id, user);
        user_id
    }

    /// Returns a copy of a pipeline record.
    #[must_use]
    pub fn record(&self, pipeline_id: Uuid) -> Option<PipelineRecord> {
        self.pipelines.get(&pipeline_id).map(|r| r.value().clone())
    }

    /// Returns every log entry written so far.
    #[must_use]
    pub fn logs(&self) -> Vec<ExecutionLogEntry> {
        self.logs.read().clone()
    }

    /// Returns the log entries of one pipeline.
    #[must_use]
    pub fn logs_for(&self, pipeline_id: Uuid) -> Vec<ExecutionLogEntry> {
        self.logs
            .read()
            .iter()
            .filter(|e| e.pipeline_id == pipeline_id)
            .cloned()
            .collect()
    }

    /// Returns the number of stored pipelines.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }
}

#[async_trait]
impl PipelineRepository for InMemoryRepository {
    async fn save_pipeline_execution(&self, record: PipelineRecord) -> Result<(), RepositoryError> {
        self.pipelines.insert(record.pipeline_id, record);
        Ok(())
    }

    async fn update_pipeline_execution(&self, update: StatusUpdate) -> Result<(), RepositoryError> {
        let mut record = self
            .pipelines
            .get_mut(&update.pipeline_id)
            .ok_or(RepositoryError::NotFound(update.pipeline_id))?;
        record.status = update.status;
        record.updated_at = update.updated_at;
        Ok(())
    }

    async fn save_execution_log(&self, entry: ExecutionLogEntry) -> Result<(), RepositoryError> {
        self.logs.write().push(entry);
        Ok(())
    }

    async fn get_pipeline_status(&self, pipeline_id: Uuid) -> Result<PipelineStatus, RepositoryError> {
        self.pipelines
            .get(&pipeline_id)
            .map(|r| r.status)
            .ok_or(RepositoryError::NotFound(pipeline_id))
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.get(&user_id).map(|u| u.value().clone()))
    }

    async fn get_pipelines_by_user(&self, user_id: Uuid) -> Result<Vec<PipelineRecord>, RepositoryError> {
        let mut records: Vec<PipelineRecord> = self
            .pipelines
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn get_pipeline_stages(&self, pipeline_id: Uuid) -> Result<Vec<ExecutionLogEntry>, RepositoryError> {
        Ok(self.logs_for(pipeline_id))
    }
}
