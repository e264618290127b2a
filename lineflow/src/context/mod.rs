//! Execution contexts.
//!
//! This module provides:
//! - The caller-supplied [`RunContext`] passed to `start_pipeline`
//! - The per-invocation [`StageContext`] handed to every stage

mod execution;

pub use execution::{RunContext, StageContext};
