//! Event bus implementation
//!
//! There is deliberately no global instance: the dispatcher receives an
//! `Arc<EventBus>` at construction and owners hand clones to whichever
//! observers need one.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{EventCategory, StatusEvent};

/// Handle identifying one subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Filter restricting which events a handler receives
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    /// Receive every event.
    #[default]
    All,
    /// Receive only events in these categories.
    Categories(Vec<EventCategory>),
}

impl EventFilter {
    /// Check whether an event passes this filter
    pub fn matches(&self, event: &StatusEvent) -> bool {
        match self {
            Self::All => true,
            Self::Categories(categories) => categories.contains(&event.category()),
        }
    }
}

type EventHandler = Box<dyn Fn(&StatusEvent) + Send + Sync>;

/// Status event bus
///
/// Supports two consumption styles: synchronous handlers invoked on the
/// publishing thread (keep them quick), and a `broadcast` receiver for async
/// consumers. Multiple independent subscribers per event kind are supported;
/// publishing with zero subscribers is not an error.
pub struct EventBus {
    sender: broadcast::Sender<StatusEvent>,
    handlers: RwLock<HashMap<SubscriptionId, (EventFilter, EventHandler)>>,
}

impl EventBus {
    /// Default broadcast channel capacity
    const CHANNEL_CAPACITY: usize = 256;

    /// Create a new bus
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(Self::CHANNEL_CAPACITY);
        Self {
            sender,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Publish an event to every matching subscriber
    ///
    /// Returns the number of synchronous handlers that saw the event.
    pub fn publish(&self, event: StatusEvent) -> usize {
        let handlers = self.handlers.read();
        let mut delivered = 0;
        for (filter, handler) in handlers.values() {
            if filter.matches(&event) {
                handler(&event);
                delivered += 1;
            }
        }
        // Broadcast send fails only when no receiver exists, which is fine
        let _ = self.sender.send(event);
        delivered
    }

    /// Register a synchronous handler
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.handlers.write().insert(id, (filter, Box::new(handler)));
        tracing::debug!("status subscription {} added", id);
        id
    }

    /// Remove a handler; returns true if it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.handlers.write().remove(&id).is_some()
    }

    /// Receiver for async consumption of events
    pub fn receiver(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    /// Number of registered synchronous handlers
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{fault_codes, MachineFault};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn advisory() -> StatusEvent {
        StatusEvent::Fault(MachineFault::new(fault_codes::ADVISORY, "test advisory"))
    }

    #[test]
    fn subscribe_and_unsubscribe() {
        let bus = EventBus::new();
        let id = bus.subscribe(EventFilter::All, |_| {});
        assert_eq!(bus.subscriber_count(), 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn fan_out_to_multiple_subscribers() {
        let bus = EventBus::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let c = first.clone();
        bus.subscribe(EventFilter::All, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let c = second.clone();
        bus.subscribe(EventFilter::All, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.publish(advisory()), 2);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn category_filtering() {
        let bus = EventBus::new();
        let faults = Arc::new(AtomicUsize::new(0));
        let displays = Arc::new(AtomicUsize::new(0));

        let c = faults.clone();
        bus.subscribe(EventFilter::Categories(vec![EventCategory::Fault]), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let c = displays.clone();
        bus.subscribe(
            EventFilter::Categories(vec![EventCategory::Display]),
            move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            },
        );

        bus.publish(advisory());
        bus.publish(StatusEvent::ReloadDisplay);

        assert_eq!(faults.load(Ordering::SeqCst), 1);
        assert_eq!(displays.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(StatusEvent::ReloadDisplay), 0);
    }

    #[tokio::test]
    async fn async_receiver_sees_events() {
        let bus = EventBus::new();
        let mut rx = bus.receiver();
        bus.publish(advisory());
        match rx.try_recv() {
            Ok(StatusEvent::Fault(fault)) => {
                assert_eq!(fault.code, fault_codes::ADVISORY);
            }
            other => panic!("unexpected receive: {:?}", other),
        }
    }
}
