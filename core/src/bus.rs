//! Explicit publish/subscribe registry for session notifications.
//!
//! Subscribers are never pruned implicitly: whoever subscribes owns the
//! returned [`SubscriberId`] and must call [`EventBus::unsubscribe`] before
//! the state captured by its handler goes away.

use std::fmt;

use crate::{Event, EventKind};

/// Handle returned by [`EventBus::subscribe`] and [`EventBus::subscribe_to`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

struct Subscription {
    id: SubscriberId,
    filter: Option<EventKind>,
    handler: Box<dyn FnMut(&Event)>,
}

/// Single notification channel carrying every [`Event`] variant.
#[derive(Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl EventBus {
    /// Creates a bus without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer that receives every published event.
    ///
    /// Observers do not count as consumers for [`EventBus::has_consumers`].
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriberId
    where
        F: FnMut(&Event) + 'static,
    {
        self.register(None, Box::new(handler))
    }

    /// Registers a consumer that only receives events of the provided kind.
    pub fn subscribe_to<F>(&mut self, kind: EventKind, handler: F) -> SubscriberId
    where
        F: FnMut(&Event) + 'static,
    {
        self.register(Some(kind), Box::new(handler))
    }

    /// Removes a subscription, returning `false` when it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|subscription| subscription.id != id);
        before != self.subscriptions.len()
    }

    /// Reports whether at least one kind-specific consumer listens for `kind`.
    #[must_use]
    pub fn has_consumers(&self, kind: EventKind) -> bool {
        self.subscriptions
            .iter()
            .any(|subscription| subscription.filter == Some(kind))
    }

    /// Number of registered subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Reports whether no subscriptions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Delivers the event synchronously to every matching subscriber in
    /// registration order.
    pub fn publish(&mut self, event: Event) {
        let kind = event.kind();
        for subscription in &mut self.subscriptions {
            if subscription.filter.map_or(true, |filter| filter == kind) {
                (subscription.handler)(&event);
            }
        }
    }

    fn register(&mut self, filter: Option<EventKind>, handler: Box<dyn FnMut(&Event)>) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            filter,
            handler,
        });
        id
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::EventBus;
    use crate::{Event, EventKind};
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn filtered_consumers_only_see_their_kind() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _id = bus.subscribe_to(EventKind::WaveCleared, move |event| {
            sink.borrow_mut().push(event.clone());
        });

        bus.publish(Event::WaveStarted { index: 0 });
        bus.publish(Event::WaveCleared { index: 0 });

        assert_eq!(*seen.borrow(), vec![Event::WaveCleared { index: 0 }]);
    }

    #[test]
    fn observers_are_not_consumers() {
        let mut bus = EventBus::new();
        let observer = bus.subscribe(|_| {});
        assert!(!bus.has_consumers(EventKind::WaveCleared));

        let consumer = bus.subscribe_to(EventKind::WaveCleared, |_| {});
        assert!(bus.has_consumers(EventKind::WaveCleared));
        assert!(!bus.has_consumers(EventKind::RunEnded));

        assert!(bus.unsubscribe(consumer));
        assert!(!bus.has_consumers(EventKind::WaveCleared));
        assert!(bus.unsubscribe(observer));
        assert!(bus.is_empty());
    }

    #[test]
    fn unsubscribed_handlers_stop_receiving() {
        let mut bus = EventBus::new();
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        let id = bus.subscribe(move |_| *counter.borrow_mut() += 1);

        bus.publish(Event::RunStarted);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id), "second unsubscribe is a no-op");
        bus.publish(Event::RunStarted);

        assert_eq!(*count.borrow(), 1);
    }
}
