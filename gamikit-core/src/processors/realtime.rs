//! Broadcasts every domain event to connected realtime clients.

use std::sync::Arc;

use async_trait::async_trait;
use gamikit_sdk::objects::EventMessage;
use tracing::trace;

use crate::events::{
    event_message_channel, Event, EventBus, EventHandler, EventMessageReceiver,
    EventMessageSender, Subscription,
};

/// Fan-out point between the bus and WebSocket sessions.
///
/// Each session holds its own receiver. A session that falls more than the
/// channel capacity behind skips the oldest messages and keeps going.
#[derive(Debug, Clone)]
pub struct RealtimeHub {
    tx: EventMessageSender,
}

impl RealtimeHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = event_message_channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> EventMessageReceiver {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Subscribe the hub to every event kind on `bus`.
    pub fn attach(&self, bus: &EventBus) -> Vec<Subscription> {
        bus.subscribe_all(Arc::new(self.clone()))
    }
}

#[async_trait]
impl EventHandler for RealtimeHub {
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        // No connected sessions is not an error.
        if let Ok(receivers) = self.tx.send(EventMessage::from(event)) {
            trace!(kind = %event.kind(), receivers, "Event broadcast");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "realtime_hub"
    }
}
