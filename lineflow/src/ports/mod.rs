//! Persistence port.
//!
//! The kernel never talks to a database directly. Everything it persists or
//! reads back goes through [`PipelineRepository`]:
//! - pipeline lifecycle records and status updates
//! - the append-only execution log
//! - the user lookup used to validate ownership

mod memory;

pub use memory::InMemoryRepository;

use crate::core::{ExecutionLogEntry, PipelineRecord, PipelineStatus, StatusUpdate, User};
use crate::errors::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// Storage operations required by the kernel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PipelineRepository: Send + Sync {
    /// Inserts a new pipeline record.
    async fn save_pipeline_execution(&self, record: PipelineRecord) -> Result<(), RepositoryError>;

    /// Updates the status of an existing pipeline record.
    async fn update_pipeline_execution(&self, update: StatusUpdate) -> Result<(), RepositoryError>;

    /// Appends one execution log entry.
    async fn save_execution_log(&self, entry: ExecutionLogEntry) -> Result<(), RepositoryError>;

    /// Reads the persisted status of a pipeline.
    async fn get_pipeline_status(&self, pipeline_id: Uuid) -> Result<PipelineStatus, RepositoryError>;

    /// Looks up a user; `Ok(None)` when the user does not exist.
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError>;

    /// Lists every pipeline owned by a user.
    async fn get_pipelines_by_user(&self, user_id: Uuid) -> Result<Vec<PipelineRecord>, RepositoryError>;

    /// Lists the execution log entries of a pipeline, oldest first.
    async fn get_pipeline_stages(&self, pipeline_id: Uuid) -> Result<Vec<ExecutionLogEntry>, RepositoryError>;
}
