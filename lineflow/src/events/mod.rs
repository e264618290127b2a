//! Status event broadcasting.
//!
//! Every status change the kernel persists is followed by a
//! [`PipelineEvent`](crate::core::PipelineEvent) handed to an
//! [`EventBroadcaster`]. Broadcasting is best-effort: it never blocks the
//! caller and never fails.

mod channel;
mod sink;

pub use channel::{BroadcastMetrics, ChannelBroadcaster};
pub use sink::{CollectingBroadcaster, EventBroadcaster, LoggingBroadcaster, NoOpBroadcaster};
