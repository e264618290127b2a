//! Event broadcaster trait and simple implementations.

use crate::core::{EventKind, PipelineEvent, PipelineStatus};
use tracing::{debug, info, Level};
use uuid::Uuid;

/// Trait for components that fan out pipeline status events.
///
/// Implementations must return promptly: the kernel calls this inline on
/// every status change, including from inside stage tasks.
pub trait EventBroadcaster: Send + Sync {
    /// Publishes one event. Errors are logged and suppressed.
    fn broadcast_update(&self, event: &PipelineEvent);
}

/// A no-op broadcaster that discards all events.
///
/// Used as the default when no broadcaster is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpBroadcaster;

impl EventBroadcaster for NoOpBroadcaster {
    fn broadcast_update(&self, _event: &PipelineEvent) {}
}

/// A broadcaster that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingBroadcaster {
    level: Level,
}

impl Default for LoggingBroadcaster {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingBroadcaster {
    /// Creates a new logging broadcaster with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging broadcaster.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventBroadcaster for LoggingBroadcaster {
    fn broadcast_update(&self, event: &PipelineEvent) {
        let stage_id = event.stage_id.map(|id| id.to_string()).unwrap_or_default();
        if self.level == Level::DEBUG {
            debug!(
                pipeline_id = %event.pipeline_id,
                stage_id = %stage_id,
                status = %event.status,
                "Event: {:?}", event.kind
            );
        } else {
            info!(
                pipeline_id = %event.pipeline_id,
                stage_id = %stage_id,
                status = %event.status,
                "Event: {:?}", event.kind
            );
        }
    }
}

/// A collecting broadcaster for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingBroadcaster {
    events: parking_lot::RwLock<Vec<PipelineEvent>>,
}

impl CollectingBroadcaster {
    /// Creates a new collecting broadcaster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns the pipeline-level statuses broadcast for one pipeline, in order.
    #[must_use]
    pub fn pipeline_statuses(&self, pipeline_id: Uuid) -> Vec<PipelineStatus> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind == EventKind::Pipeline && e.pipeline_id == pipeline_id)
            .map(|e| e.status)
            .collect()
    }

    /// Returns the stage-level events broadcast for one stage, in order.
    #[must_use]
    pub fn stage_statuses(&self, stage_id: Uuid) -> Vec<PipelineStatus> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind == EventKind::Stage && e.stage_id == Some(stage_id))
            .map(|e| e.status)
            .collect()
    }
}

impl EventBroadcaster for CollectingBroadcaster {
    fn broadcast_update(&self, event: &PipelineEvent) {
        self.events.write().push(event.clone());
    }
}
