//! # Realtime Event Bus
//!
//! Push fan-out of accepted transitions to subscribers of a company.
//!
//! ## Topics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Event Bus                                       │
//! │                                                                         │
//! │  topics: DashMap<company_id, broadcast::Sender<QueueEvent>>            │
//! │                                                                         │
//! │  publish(event{company: acme}) ──▶ topic "acme" ──┬──▶ dashboard #1    │
//! │                                                   ├──▶ dashboard #2    │
//! │                                                   └──▶ status page     │
//! │                                                                         │
//! │  publish(event{company: blue}) ──▶ topic "blue" ──▶ (no subscribers:   │
//! │                                                      event dropped)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Delivery
//! Best-effort, at-most-once. A disconnected subscriber misses events and a
//! slow one lags (oldest events are overwritten). Consumers reconcile with
//! `QueueService::status` or `QueueService::queue_snapshot` on reconnect.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use waitline_core::QueueEvent;

/// Per-company broadcast topics.
#[derive(Clone)]
pub struct EventBus {
    topics: Arc<DashMap<String, broadcast::Sender<QueueEvent>>>,
    capacity: usize,
}

impl EventBus {
    /// Creates a bus whose topics buffer `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        EventBus {
            topics: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribes to every event of `company_id`.
    pub fn subscribe(&self, company_id: &str) -> broadcast::Receiver<QueueEvent> {
        let sender = self
            .topics
            .entry(company_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);

        debug!(company_id = %company_id, subscribers = sender.receiver_count() + 1, "New event subscriber");
        sender.subscribe()
    }

    /// Publishes `event` to its company topic.
    ///
    /// Returns how many subscribers it was handed to; zero means dropped.
    pub fn publish(&self, event: QueueEvent) -> usize {
        let company_id = event.company_id.clone();

        let delivered = match self.topics.get(&company_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        };

        if delivered == 0 {
            // Nobody listening: drop the topic so idle companies cost nothing.
            self.topics
                .remove_if(&company_id, |_, sender| sender.receiver_count() == 0);
        }

        trace!(company_id = %company_id, delivered, "Event published");
        delivered
    }

    /// Number of live topics.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use waitline_core::EntryState;

    fn event(company_id: &str, entry_id: &str) -> QueueEvent {
        QueueEvent {
            company_id: company_id.into(),
            queue_id: "front-desk".into(),
            entry_id: entry_id.into(),
            customer_id: "c-1".into(),
            new_state: EntryState::Called,
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fan_out_is_scoped_to_company() {
        let bus = EventBus::new(16);
        let mut acme_a = bus.subscribe("acme");
        let mut acme_b = bus.subscribe("acme");
        let mut blue = bus.subscribe("blue");

        assert_eq!(bus.publish(event("acme", "e-1")), 2);

        assert_eq!(acme_a.recv().await.unwrap().entry_id, "e-1");
        assert_eq!(acme_b.recv().await.unwrap().entry_id, "e-1");
        assert!(matches!(
            blue.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(event("acme", "e-1")), 0);

        let rx = bus.subscribe("acme");
        drop(rx);
        assert_eq!(bus.topic_count(), 1);
        assert_eq!(bus.publish(event("acme", "e-2")), 0);
        assert_eq!(bus.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe("acme");

        for i in 0..5 {
            bus.publish(event("acme", &format!("e-{i}")));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(rx.recv().await.unwrap().entry_id, "e-3");
    }
}
