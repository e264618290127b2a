//! Bounded-channel broadcaster with per-subscriber backpressure.

use super::EventBroadcaster;
use crate::config::KernelConfig;
use crate::core::PipelineEvent;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Metrics for backpressure monitoring.
#[derive(Debug, Default)]
pub struct BroadcastMetrics {
    /// Number of deliveries into a subscriber channel.
    delivered: AtomicU64,
    /// Number of deliveries dropped because a channel was full.
    dropped: AtomicU64,
    /// Number of subscribers removed after closing.
    pruned: AtomicU64,
}

impl BroadcastMetrics {
    /// Records a successful delivery.
    pub fn record_delivery(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped delivery.
    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records pruned subscribers.
    pub fn record_pruned(&self, count: u64) {
        self.pruned.fetch_add(count, Ordering::Relaxed);
    }

    /// Returns the number of deliveries.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Returns the number of dropped deliveries.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of pruned subscribers.
    #[must_use]
    pub fn pruned(&self) -> u64 {
        self.pruned.load(Ordering::Relaxed)
    }
}

/// Fans events out to every subscriber through its own bounded channel.
///
/// When a subscriber's channel is full the newest event is dropped for that
/// subscriber only. Subscribers whose receiver was dropped are pruned on the
/// next broadcast.
#[derive(Debug)]
pub struct ChannelBroadcaster {
    subscribers: Mutex<Vec<mpsc::Sender<PipelineEvent>>>,
    buffer: usize,
    metrics: BroadcastMetrics,
}

impl ChannelBroadcaster {
    /// Creates a broadcaster whose subscribers buffer `buffer` events each.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            buffer: buffer.max(1),
            metrics: BroadcastMetrics::default(),
        }
    }

    /// Creates a broadcaster sized by `config.broadcast_buffer`.
    #[must_use]
    pub fn from_config(config: &KernelConfig) -> Self {
        Self::new(config.broadcast_buffer)
    }

    /// Registers a new subscriber and returns its receiving end.
    pub fn subscribe(&self) -> mpsc::Receiver<PipelineEvent> {
        let (tx, rx) = mpsc::channel(self.buffer);
        self.subscribers.lock().push(tx);
        debug!(buffer = self.buffer, "Subscriber registered");
        rx
    }

    /// Returns the number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Returns the per-subscriber buffer size.
    #[must_use]
    pub fn buffer(&self) -> usize {
        self.buffer
    }

    /// Returns the metrics.
    #[must_use]
    pub fn metrics(&self) -> &BroadcastMetrics {
        &self.metrics
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(10)
    }
}

impl EventBroadcaster for ChannelBroadcaster {
    fn broadcast_update(&self, event: &PipelineEvent) {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();

        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                self.metrics.record_delivery();
                true
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.record_drop();
                warn!(
                    pipeline_id = %event.pipeline_id,
                    status = %event.status,
                    dropped_total = self.metrics.dropped(),
                    "Event dropped due to backpressure"
                );
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });

        let pruned = before - subscribers.len();
        if pruned > 0 {
            self.metrics.record_pruned(pruned as u64);
            debug!(pruned, "Closed subscribers removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PipelineStatus;
    use uuid::Uuid;

    fn event(status: PipelineStatus) -> PipelineEvent {
        PipelineEvent::pipeline(Uuid::new_v4(), status)
    }

    #[test]
    fn test_metrics_default() {
        let metrics = BroadcastMetrics::default();
        assert_eq!(metrics.delivered(), 0);
        assert_eq!(metrics.dropped(), 0);
        assert_eq!(metrics.pruned(), 0);
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = BroadcastMetrics::default();
        metrics.record_delivery();
        metrics.record_delivery();
        metrics.record_drop();

        assert_eq!(metrics.delivered(), 2);
        assert_eq!(metrics.dropped(), 1);

        metrics.record_pruned(2);
        assert_eq!(metrics.pruned(), 2);
    }

    #[test]
    fn test_buffer_from_config() {
        let config = KernelConfig::default().with_broadcast_buffer(3);
        assert_eq!(ChannelBroadcaster::from_config(&config).buffer(), 3);
        assert_eq!(ChannelBroadcaster::new(0).buffer(), 1);
    }

    #[tokio::test]
    async fn test_delivers_to_every_subscriber() {
        let broadcaster = ChannelBroadcaster::new(4);
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        broadcaster.broadcast_update(&event(PipelineStatus::Running));

        assert_eq!(first.recv().await.map(|e| e.status), Some(PipelineStatus::Running));
        assert_eq!(second.recv().await.map(|e| e.status), Some(PipelineStatus::Running));
        assert_eq!(broadcaster.metrics().delivered(), 2);
    }

    #[tokio::test]
    async fn test_full_channel_drops_newest() {
        let broadcaster = ChannelBroadcaster::new(2);
        let mut rx = broadcaster.subscribe();

        broadcaster.broadcast_update(&event(PipelineStatus::Created));
        broadcaster.broadcast_update(&event(PipelineStatus::Running));
        broadcaster.broadcast_update(&event(PipelineStatus::Completed));

        assert_eq!(broadcaster.metrics().dropped(), 1);
        assert_eq!(rx.recv().await.map(|e| e.status), Some(PipelineStatus::Created));
        assert_eq!(rx.recv().await.map(|e| e.status), Some(PipelineStatus::Running));
        assert!(rx.try_recv().is_err());
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_starve_others() {
        let broadcaster = ChannelBroadcaster::new(1);
        let _slow = broadcaster.subscribe();
        let mut fast = broadcaster.subscribe();

        broadcaster.broadcast_update(&event(PipelineStatus::Created));
        assert!(fast.recv().await.is_some());
        broadcaster.broadcast_update(&event(PipelineStatus::Running));

        assert_eq!(fast.recv().await.map(|e| e.status), Some(PipelineStatus::Running));
        assert_eq!(broadcaster.metrics().dropped(), 1);
    }

    #[test]
    fn test_closed_subscribers_pruned() {
        let broadcaster = ChannelBroadcaster::default();
        let rx = broadcaster.subscribe();
        let _kept = broadcaster.subscribe();
        drop(rx);

        broadcaster.broadcast_update(&event(PipelineStatus::Created));

        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(broadcaster.metrics().pruned(), 1);
        assert_eq!(broadcaster.buffer(), 10);
    }
}
