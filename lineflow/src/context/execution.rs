//! Caller-supplied run context and the per-stage execution context.

use crate::cancellation::CancellationToken;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Context supplied by the caller of `start_pipeline`.
///
/// The deadline is informational: the kernel never enforces it, stages may.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// The request ID (for request-scoped tracking).
    request_id: Option<Uuid>,
    /// Optional deadline.
    deadline: Option<Instant>,
    /// Free-form metadata forwarded to stages.
    metadata: HashMap<String, serde_json::Value>,
}

impl RunContext {
    /// Creates an empty run context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Sets the deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> Option<Uuid> {
        self.request_id
    }

    /// Returns the deadline.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true once the deadline has passed.
    #[must_use]
    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Returns a metadata value.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }
}

/// The context handed to a stage for one invocation.
#[derive(Debug, Clone)]
pub struct StageContext {
    pipeline_id: Uuid,
    user_id: Uuid,
    stage_id: Uuid,
    run: RunContext,
    cancel_token: Arc<CancellationToken>,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(
        pipeline_id: Uuid,
        user_id: Uuid,
        stage_id: Uuid,
        run: RunContext,
        cancel_token: Arc<CancellationToken>,
    ) -> Self {
        Self {
            pipeline_id,
            user_id,
            stage_id,
            run,
            cancel_token,
        }
    }

    /// Creates a context detached from any pipeline (tests, ad-hoc calls).
    #[must_use]
    pub fn detached(stage_id: Uuid) -> Self {
        Self::new(
            Uuid::nil(),
            Uuid::nil(),
            stage_id,
            RunContext::default(),
            Arc::new(CancellationToken::new()),
        )
    }

    /// Returns the pipeline ID.
    #[must_use]
    pub fn pipeline_id(&self) -> Uuid {
        self.pipeline_id
    }

    /// Returns the owning user ID.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Returns the stage ID.
    #[must_use]
    pub fn stage_id(&self) -> Uuid {
        self.stage_id
    }

    /// Returns the caller's run context.
    #[must_use]
    pub fn run(&self) -> &RunContext {
        &self.run
    }

    /// Returns the cancellation token of the run.
    #[must_use]
    pub fn cancel_token(&self) -> &Arc<CancellationToken> {
        &self.cancel_token
    }

    /// Checks if the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}
