//! Stage error and per-attempt outcome types.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Error raised by a stage's execute, error-handler or rollback hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StageError {
    /// The error message.
    pub message: String,
}

impl StageError {
    /// Creates a new stage error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Prefixes the message with extra context.
    #[must_use]
    pub fn wrap(self, context: &str) -> Self {
        Self {
            message: format!("{context}: {}", self.message),
        }
    }
}

impl From<String> for StageError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for StageError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// What happened when one stage ran once.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// The stage.
    pub stage_id: Uuid,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// When the attempt ended.
    pub ended_at: DateTime<Utc>,
    /// The output or the error.
    pub result: Result<serde_json::Value, StageError>,
}

impl StageOutcome {
    /// Creates an outcome ending now.
    #[must_use]
    pub fn finish(
        stage_id: Uuid,
        started_at: DateTime<Utc>,
        result: Result<serde_json::Value, StageError>,
    ) -> Self {
        Self {
            stage_id,
            started_at,
            ended_at: Utc::now(),
            result,
        }
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        (self.ended_at - self.started_at)
            .to_std()
            .map_or(0.0, |elapsed| elapsed.as_secs_f64() * 1000.0)
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_wrap() {
        let err = StageError::new("Connection timeout").wrap("stage execution failed");
        assert_eq!(err.to_string(), "stage execution failed: Connection timeout");
    }

    #[test]
    fn test_stage_error_from_str() {
        let err: StageError = "bad part".into();
        assert_eq!(err.message, "bad part");
    }

    #[test]
    fn test_outcome_duration() {
        let started = Utc::now();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let outcome = StageOutcome::finish(Uuid::new_v4(), started, Ok(serde_json::json!(1)));

        assert!(outcome.is_success());
        assert!(outcome.duration_ms() >= 10.0);
    }

    #[test]
    fn test_outcome_duration_clamps_clock_skew() {
        let outcome = StageOutcome {
            stage_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ended_at: Utc::now() - chrono::Duration::milliseconds(5),
            result: Ok(serde_json::Value::Null),
        };
        assert_eq!(outcome.duration_ms(), 0.0);
    }

    #[test]
    fn test_outcome_failure() {
        let outcome = StageOutcome::finish(
            Uuid::new_v4(),
            Utc::now(),
            Err(StageError::new("jammed")),
        );
        assert!(!outcome.is_success());
    }
}
