//! Records the kernel reads from and writes to the repository port.

use super::{LogStatus, PipelineStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The persisted lifecycle record of one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRecord {
    /// Pipeline identity.
    pub pipeline_id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Current status.
    pub status: PipelineStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl PipelineRecord {
    /// Creates a fresh `Created` record.
    #[must_use]
    pub fn created(pipeline_id: Uuid, user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            pipeline_id,
            user_id,
            status: PipelineStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A status update keyed by pipeline identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Pipeline identity.
    pub pipeline_id: Uuid,
    /// New status.
    pub status: PipelineStatus,
    /// Update time.
    pub updated_at: DateTime<Utc>,
}

impl StatusUpdate {
    /// Creates an update stamped with the current time.
    #[must_use]
    pub fn now(pipeline_id: Uuid, status: PipelineStatus) -> Self {
        Self {
            pipeline_id,
            status,
            updated_at: Utc::now(),
        }
    }
}

/// One append-only outcome of a stage attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// The stage (nil for service-level errors with no failing stage).
    pub stage_id: Uuid,
    /// The pipeline.
    pub pipeline_id: Uuid,
    /// Outcome.
    pub status: LogStatus,
    /// Error message for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When the entry was written.
    pub timestamp: DateTime<Utc>,
}

impl ExecutionLogEntry {
    /// A successful stage attempt.
    #[must_use]
    pub fn completed(pipeline_id: Uuid, stage_id: Uuid) -> Self {
        Self {
            stage_id,
            pipeline_id,
            status: LogStatus::Completed,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    /// A failed stage attempt.
    #[must_use]
    pub fn failed(pipeline_id: Uuid, stage_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            stage_id,
            pipeline_id,
            status: LogStatus::Failed,
            error_message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    /// A service-level execution error.
    #[must_use]
    pub fn error(pipeline_id: Uuid, stage_id: Option<Uuid>, message: impl Into<String>) -> Self {
        Self {
            stage_id: stage_id.unwrap_or(Uuid::nil()),
            pipeline_id,
            status: LogStatus::Error,
            error_message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Role of a user in the owning system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full control.
    SuperAdmin,
    /// Administrative access.
    Admin,
    /// Manages pipelines of a team.
    Manager,
    /// Default role.
    #[default]
    Worker,
}

/// A pipeline owner. The kernel only checks that one exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identity.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
    /// Unique email.
    pub email: String,
    /// Role.
    #[serde(default)]
    pub role: UserRole,
}

impl User {
    /// Creates a worker-role user with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            role: UserRole::default(),
        }
    }

    /// Sets the role.
    #[must_use]
    pub fn with_role(mut self, role: UserRole) -> Self {
        self.role = role;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_record() {
        let record = PipelineRecord::created(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(record.status, PipelineStatus::Created);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_log_entry_constructors() {
        let pipeline_id = Uuid::new_v4();
        let stage_id = Uuid::new_v4();

        let ok = ExecutionLogEntry::completed(pipeline_id, stage_id);
        assert_eq!(ok.status, LogStatus::Completed);
        assert!(ok.error_message.is_none());

        let failed = ExecutionLogEntry::failed(pipeline_id, stage_id, "boom");
        assert_eq!(failed.status, LogStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("boom"));

        let error = ExecutionLogEntry::error(pipeline_id, None, "user not found");
        assert_eq!(error.stage_id, Uuid::nil());
        assert_eq!(error.status, LogStatus::Error);
    }

    #[test]
    fn test_user_role_default() {
        let user = User::new("Ada", "ada@example.com");
        assert_eq!(user.role, UserRole::Worker);

        let admin = user.with_role(UserRole::Admin);
        let json = serde_json::to_value(&admin).unwrap();
        assert_eq!(json["role"], "admin");
    }
}
