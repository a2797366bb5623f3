//! Delivery sink
//!
//! Publishes aggregator output and operational signals to zero or more
//! subscribers over a bounded broadcast channel. A slow or disconnected
//! subscriber has its oldest unread items dropped; backpressure never
//! stalls the pipeline.

use call_coach_core::{MeddicMap, SourceTier, Suggestion};
use tokio::sync::broadcast;

/// Events delivered to subscribers
#[derive(Debug, Clone)]
pub enum DeliveryEvent {
    /// A ranked suggestion for the rep
    Suggestion(Suggestion),
    /// MEDDIC qualification progress
    MeddicUpdate {
        completion_pct: f32,
        map: MeddicMap,
    },
    /// A tier has been disabled or degraded for the rest of the call.
    /// Reported once, not per failure.
    TierDegraded { tier: SourceTier, reason: String },
    /// The call ended
    CallEnded { reason: String },
}

/// Broadcast-backed delivery sink
#[derive(Clone)]
pub struct DeliverySink {
    tx: broadcast::Sender<DeliveryEvent>,
}

impl DeliverySink {
    /// Create a sink with the given per-subscriber buffer depth
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe from now; late subscribers only see future items
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Delivery is at-least-once to connected
    /// subscribers; with none connected the event is dropped.
    pub fn publish(&self, event: DeliveryEvent) {
        let _ = self.tx.send(event);
    }

    /// Current subscriber count
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
