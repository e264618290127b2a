//! Cooperative cancellation for pipeline runs.
//!
//! A cancel request flips the persisted status and fires the run's
//! [`CancellationToken`]; stages observe it through their context.

mod token;

pub use token::CancellationToken;
