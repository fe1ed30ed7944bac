//! Broadcast event bus for distributing `GraphEvent` to external collaborators.
//!
//! Built on `tokio::sync::broadcast`. Skills publish and move on; they never
//! observe a subscriber synchronously. Publishing with no active subscribers
//! is a no-op.

use nodeloom_types::event::GraphEvent;
use tokio::sync::broadcast;

/// Multi-consumer event bus for engine events.
///
/// Cloning the bus clones the sender, so the registry, dispatcher, and any
/// embedding UI can share one channel.
pub struct EventBus {
    sender: broadcast::Sender<GraphEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns how many subscribers received it.
    pub fn publish(&self, event: GraphEvent) -> usize {
        tracing::trace!(event = event.kind(), "publishing graph event");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
