//! Observability utilities.
//!
//! The kernel logs through `tracing` macros everywhere; this module only
//! installs a subscriber for hosts that do not bring their own, and times
//! stage attempts.

mod tracing;

pub use tracing::{init_tracing, LogFormat, SpanTimer};
