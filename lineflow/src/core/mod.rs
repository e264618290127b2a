//! Core domain model types for lineflow.
//!
//! This module contains the fundamental types shared by the orchestrators,
//! the service and the ports:
//! - Pipeline and log status enums
//! - Persisted records
//! - Progress events

mod event;
mod records;
mod status;

pub use event::{EventKind, PipelineEvent};
pub use records::{ExecutionLogEntry, PipelineRecord, StatusUpdate, User, UserRole};
pub use status::{ExecutionMode, LogStatus, PipelineStatus, UnknownStatus};
