//! Stage trait and implementations.
//!
//! Stages are the fundamental units of work in a lineflow pipeline. A stage
//! is opaque to the kernel: it takes a JSON value and returns a JSON value or
//! fails, and it knows how to report and undo its own work.

mod result;

pub use result::{StageError, StageOutcome};

use crate::context::StageContext;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use tracing::{debug, warn};
use uuid::Uuid;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the unique identity of the stage.
    fn id(&self) -> Uuid;

    /// Executes the stage.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The stage execution context
    /// * `input` - The pipeline input (parallel) or the previous stage's output (sequential)
    async fn execute(&self, ctx: &StageContext, input: Value) -> Result<Value, StageError>;

    /// Reacts to a failure of [`execute`](Self::execute).
    ///
    /// The returned error is what the orchestrator propagates.
    async fn handle_error(&self, ctx: &StageContext, error: StageError) -> StageError {
        warn!(
            pipeline_id = %ctx.pipeline_id(),
            stage_id = %self.id(),
            error = %error,
            "Error in stage execution"
        );
        error.wrap("stage execution failed")
    }

    /// Undoes the work of a completed stage after a later failure.
    ///
    /// `input` and `output` are the values captured for this stage under the
    /// default rollback order; the legacy forward order passes the
    /// post-failure value as both.
    async fn rollback(
        &self,
        ctx: &StageContext,
        input: &Value,
        output: &Value,
    ) -> Result<(), StageError> {
        let _ = (input, output);
        debug!(pipeline_id = %ctx.pipeline_id(), stage_id = %self.id(), "Rolling back stage");
        Ok(())
    }
}

/// The default stage: passes its input through unchanged.
#[derive(Debug, Clone)]
pub struct BaseStage {
    id: Uuid,
}

impl BaseStage {
    /// Creates a base stage with a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// Creates a base stage with a known identity.
    #[must_use]
    pub fn with_id(id: Uuid) -> Self {
        Self { id }
    }
}

impl Default for BaseStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for BaseStage {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn execute(&self, ctx: &StageContext, input: Value) -> Result<Value, StageError> {
        debug!(pipeline_id = %ctx.pipeline_id(), stage_id = %self.id, "Executing stage");
        Ok(input)
    }
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&StageContext, Value) -> Result<Value, StageError> + Send + Sync,
{
    id: Uuid,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageContext, Value) -> Result<Value, StageError> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(func: F) -> Self {
        Self {
            id: Uuid::new_v4(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&StageContext, Value) -> Result<Value, StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("id", &self.id).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&StageContext, Value) -> Result<Value, StageError> + Send + Sync,
{
    fn id(&self) -> Uuid {
        self.id
    }

    async fn execute(&self, ctx: &StageContext, input: Value) -> Result<Value, StageError> {
        (self.func)(ctx, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_base_stage_passthrough() {
        let stage = BaseStage::new();
        let ctx = StageContext::detached(stage.id());

        let output = stage.execute(&ctx, json!("x")).await.unwrap();
        assert_eq!(output, json!("x"));
    }

    #[tokio::test]
    async fn test_base_stage_ids_unique() {
        assert_ne!(BaseStage::new().id(), BaseStage::new().id());
    }

    #[tokio::test]
    async fn test_default_handle_error_wraps() {
        let stage = BaseStage::new();
        let ctx = StageContext::detached(stage.id());

        let err = stage.handle_error(&ctx, StageError::new("jam")).await;
        assert_eq!(err.message, "stage execution failed: jam");
    }

    #[tokio::test]
    async fn test_default_rollback_is_ok() {
        let stage = BaseStage::new();
        let ctx = StageContext::detached(stage.id());
        assert!(stage.rollback(&ctx, &json!(1), &json!(2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_fn_stage() {
        let stage = FnStage::new(|_ctx, input| {
            let n = input.as_i64().ok_or_else(|| StageError::new("not a number"))?;
            Ok(json!(n * 2))
        });
        let ctx = StageContext::detached(stage.id());

        assert_eq!(stage.execute(&ctx, json!(21)).await.unwrap(), json!(42));
        assert!(stage.execute(&ctx, json!("x")).await.is_err());
    }
}
