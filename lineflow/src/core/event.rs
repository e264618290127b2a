//! Progress events emitted on every status change.

use super::PipelineStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether an event concerns a whole pipeline or a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Pipeline-level status change.
    Pipeline,
    /// Stage-level progress.
    Stage,
}

/// A status notification fanned out to listeners.
///
/// Events are progress hints; the persisted status is the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// The pipeline this event belongs to.
    pub pipeline_id: Uuid,
    /// The stage, for stage events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<Uuid>,
    /// The new status.
    pub status: PipelineStatus,
    /// When the event was produced.
    pub timestamp: DateTime<Utc>,
}

impl PipelineEvent {
    /// Creates a pipeline-level event.
    #[must_use]
    pub fn pipeline(pipeline_id: Uuid, status: PipelineStatus) -> Self {
        Self {
            kind: EventKind::Pipeline,
            pipeline_id,
            stage_id: None,
            status,
            timestamp: Utc::now(),
        }
    }

    /// Creates a stage-level event.
    #[must_use]
    pub fn stage(pipeline_id: Uuid, stage_id: Uuid, status: PipelineStatus) -> Self {
        Self {
            kind: EventKind::Stage,
            pipeline_id,
            stage_id: Some(stage_id),
            status,
            timestamp: Utc::now(),
        }
    }

    /// Serializes the event into a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
