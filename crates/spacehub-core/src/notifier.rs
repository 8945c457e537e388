//! Notification sinks for domain events.
//!
//! Notifications are fire-and-forget: they run after the state change has
//! committed and a failing sink never undoes it.

use spacehub_types::DomainEvent;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub trait Notifier: Send + Sync {
    fn notify(&self, event: DomainEvent);
}

/// Logs every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: DomainEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => info!(kind = event.kind(), event = %json, "Domain event"),
            Err(_) => info!(kind = event.kind(), "Domain event"),
        }
    }
}

/// Fans events out to in-process subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    events: broadcast::Sender<DomainEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.events.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, event: DomainEvent) {
        let kind = event.kind();
        if self.events.send(event).is_err() {
            debug!(kind, "No subscribers for domain event");
        }
    }
}

/// Delivers each event to several sinks.
pub struct FanoutNotifier {
    sinks: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(sinks: Vec<Box<dyn Notifier>>) -> Self {
        Self { sinks }
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, event: DomainEvent) {
        for sink in &self.sinks {
            sink.notify(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use spacehub_types::{BookingId, UserId};

    fn confirmed() -> DomainEvent {
        DomainEvent::BookingConfirmed {
            booking_id: BookingId::new(),
            guest_id: UserId::new(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();
        let event = confirmed();
        notifier.notify(event.clone());
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        BroadcastNotifier::new(1).notify(confirmed());
    }

    #[tokio::test]
    async fn test_fanout_delivers_to_every_sink() {
        let a = BroadcastNotifier::new(8);
        let b = BroadcastNotifier::new(8);
        let (mut ra, mut rb) = (a.subscribe(), b.subscribe());
        let fanout = FanoutNotifier::new(vec![Box::new(a), Box::new(b), Box::new(TracingNotifier)]);

        fanout.notify(confirmed());
        assert_eq!(ra.recv().await.unwrap().kind(), "booking_confirmed");
        assert_eq!(rb.recv().await.unwrap().kind(), "booking_confirmed");
    }
}
