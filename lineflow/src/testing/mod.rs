//! Testing utilities for lineflow pipelines.
//!
//! This module provides:
//! - Mock stages that record executions and rollbacks
//! - A harness wiring a service to in-memory adapters

mod fixtures;
mod mocks;

pub use fixtures::TestHarness;
pub use mocks::{
    rollback_journal, FailingStage, RecordingStage, RollbackCall, RollbackJournal, SlowStage,
};
