//! Mock stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::context::StageContext;
use crate::stages::{Stage, StageError};

/// A rollback call observed by a [`RecordingStage`].
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackCall {
    /// The stage that was rolled back.
    pub stage_id: Uuid,
    /// Input passed to rollback.
    pub input: Value,
    /// Output passed to rollback.
    pub output: Value,
}

/// Rollback calls shared by several stages, in call order.
pub type RollbackJournal = Arc<Mutex<Vec<RollbackCall>>>;

/// Creates an empty rollback journal.
#[must_use]
pub fn rollback_journal() -> RollbackJournal {
    Arc::new(Mutex::new(Vec::new()))
}

/// A stage that records its inputs and rollbacks.
///
/// Returns its input unchanged unless an output is configured.
#[derive(Debug)]
pub struct RecordingStage {
    id: Uuid,
    output: Option<Value>,
    inputs: Mutex<Vec<Value>>,
    rollbacks: Mutex<Vec<RollbackCall>>,
    journal: Option<RollbackJournal>,
    rollback_error: Option<String>,
}

impl RecordingStage {
    /// Creates a passthrough recording stage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            output: None,
            inputs: Mutex::new(Vec::new()),
            rollbacks: Mutex::new(Vec::new()),
            journal: None,
            rollback_error: None,
        }
    }

    /// Makes the stage return a fixed output.
    #[must_use]
    pub fn returning(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    /// Also appends rollback calls to a shared journal.
    #[must_use]
    pub fn with_journal(mut self, journal: RollbackJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Makes rollback fail (after being recorded).
    #[must_use]
    pub fn failing_rollback(mut self, message: impl Into<String>) -> Self {
        self.rollback_error = Some(message.into());
        self
    }

    /// Returns the inputs of every execution.
    #[must_use]
    pub fn inputs(&self) -> Vec<Value> {
        self.inputs.lock().clone()
    }

    /// Returns the number of executions.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Returns the rollback calls.
    #[must_use]
    pub fn rollbacks(&self) -> Vec<RollbackCall> {
        self.rollbacks.lock().clone()
    }

    /// Returns the number of rollback calls.
    #[must_use]
    pub fn rollback_count(&self) -> usize {
        self.rollbacks.lock().len()
    }
}

impl Default for RecordingStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn execute(&self, _ctx: &StageContext, input: Value) -> Result<Value, StageError> {
        self.inputs.lock().push(input.clone());
        Ok(self.output.clone().unwrap_or(input))
    }

    async fn rollback(
        &self,
        _ctx: &StageContext,
        input: &Value,
        output: &Value,
    ) -> Result<(), StageError> {
        let call = RollbackCall {
            stage_id: self.id,
            input: input.clone(),
            output: output.clone(),
        };
        self.rollbacks.lock().push(call.clone());
        if let Some(journal) = &self.journal {
            journal.lock().push(call);
        }
        match &self.rollback_error {
            Some(message) => Err(StageError::new(message.clone())),
            None => Ok(()),
        }
    }
}

/// A stage that always fails.
#[derive(Debug)]
pub struct FailingStage {
    id: Uuid,
    error: String,
    handled_error: Option<String>,
    calls: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl FailingStage {
    /// Creates a stage failing with `error`.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            error: error.into(),
            handled_error: None,
            calls: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
        }
    }

    /// Makes the error handler replace the error with `message`.
    #[must_use]
    pub fn with_handled_error(mut self, message: impl Into<String>) -> Self {
        self.handled_error = Some(message.into());
        self
    }

    /// Returns the number of executions.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the number of rollback calls.
    #[must_use]
    pub fn rollback_count(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn execute(&self, _ctx: &StageContext, _input: Value) -> Result<Value, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StageError::new(self.error.clone()))
    }

    async fn handle_error(&self, _ctx: &StageContext, error: StageError) -> StageError {
        match &self.handled_error {
            Some(message) => StageError::new(message.clone()),
            None => error,
        }
    }

    async fn rollback(
        &self,
        _ctx: &StageContext,
        _input: &Value,
        _output: &Value,
    ) -> Result<(), StageError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A stage that sleeps before returning its input.
#[derive(Debug)]
pub struct SlowStage {
    id: Uuid,
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowStage {
    /// Creates a slow stage.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a slow stage with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Returns the number of executions started.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn execute(&self, _ctx: &StageContext, input: Value) -> Result<Value, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(input)
    }
}
