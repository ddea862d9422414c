//! Event broadcaster for WebSocket real-time updates.
//!
//! Fans execution, test case and session events out to every connected client
//! through a `tokio::sync::broadcast` channel.

use tokio::sync::broadcast;
use tracing::debug;

use crate::models::{WsEvent, WsEventMessage};

/// Default capacity for the broadcast channel.
const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Distributes tracker events to all connected WebSocket clients.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<WsEventMessage>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receiver for all events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WsEventMessage> {
        self.sender.subscribe()
    }

    /// Timestamp and publish an event. Returns how many clients received it;
    /// having no clients is not an error.
    pub fn publish(&self, event: WsEvent) -> usize {
        let receivers = self.sender.send(WsEventMessage::new(event)).unwrap_or(0);
        debug!(receivers, "Published tracker event");
        receivers
    }

    /// Number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Execution, ExecutionKey, ExecutionStatus};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_execution_event_reaches_every_client() {
        let broadcaster = EventBroadcaster::new();
        let mut rx1 = broadcaster.subscribe();
        let mut rx2 = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        let mut execution = Execution::not_run(ExecutionKey::unscoped(Uuid::now_v7()));
        execution.status = ExecutionStatus::Passed;
        assert_eq!(broadcaster.publish(WsEvent::execution_updated(&execution)), 2);

        for rx in [&mut rx1, &mut rx2] {
            let message = rx.recv().await.unwrap();
            assert!(matches!(
                message.event,
                WsEvent::ExecutionUpdated(ref payload) if payload.status == ExecutionStatus::Passed
            ));
        }
    }

    #[test]
    fn test_publish_without_clients() {
        let broadcaster = EventBroadcaster::new();
        let key = ExecutionKey::unscoped(Uuid::now_v7());
        assert_eq!(broadcaster.publish(WsEvent::execution_reset(key)), 0);
    }
}
