//! Message dispatcher for inbound gateway envelopes.
//!
//! Push-based: subscribers register callbacks that the session task invokes
//! synchronously, in arrival order, for every envelope it publishes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use idlemmo_shared::Envelope;

/// Handle returned by [`MessageDispatcher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&Envelope) + Send + 'static>;

/// Fan-out point for decoded inbound messages.
///
/// Callbacks run on the session task while the subscriber list is locked, so
/// a callback must not subscribe, unsubscribe or dispatch on the same
/// dispatcher.
#[derive(Clone, Default)]
pub struct MessageDispatcher {
    subscribers: Arc<Mutex<Vec<(SubscriptionId, Subscriber)>>>,
    next_id: Arc<AtomicU64>,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every published envelope.
    pub fn subscribe(&self, callback: impl FnMut(&Envelope) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Box::new(callback)));
        id
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    /// Deliver one envelope to every subscriber, in subscription order.
    pub fn dispatch(&self, envelope: &Envelope) {
        for (_, subscriber) in self.lock().iter_mut() {
            subscriber(envelope);
        }
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Clear all subscribers.
    pub fn clear(&self) {
        self.lock().clear();
    }

    // A panicking subscriber poisons the lock; later dispatches still run.
    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Subscriber)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    #[test]
    fn test_subscribe_and_dispatch() {
        let dispatcher = MessageDispatcher::new();
        let count = Arc::new(AtomicU32::new(0));

        let count_clone = Arc::clone(&count);
        dispatcher.subscribe(move |_envelope| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(dispatcher.subscriber_count(), 1);

        dispatcher.dispatch(&Envelope::empty("S_BagInfo"));
        dispatcher.dispatch(&Envelope::empty("S_ExpUpdate"));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_every_subscriber_sees_every_envelope_in_order() {
        let dispatcher = MessageDispatcher::new();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&first);
        dispatcher.subscribe(move |env| sink.lock().unwrap().push(env.kind.clone()));
        let sink = Arc::clone(&second);
        dispatcher.subscribe(move |env| sink.lock().unwrap().push(env.kind.clone()));

        for kind in ["S_LoginOK", "S_SeqStarted", "S_SeqResult"] {
            dispatcher.dispatch(&Envelope::empty(kind));
        }

        let expected = vec!["S_LoginOK", "S_SeqStarted", "S_SeqResult"];
        assert_eq!(*first.lock().unwrap(), expected);
        assert_eq!(*second.lock().unwrap(), expected);
    }

    #[test]
    fn test_unsubscribe() {
        let dispatcher = MessageDispatcher::new();
        let count = Arc::new(AtomicU32::new(0));

        let count_clone = Arc::clone(&count);
        let id = dispatcher.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        let other = dispatcher.subscribe(|_| {});

        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));
        assert_ne!(id, other);

        dispatcher.dispatch(&Envelope::empty("S_BagInfo"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.subscriber_count(), 1);

        dispatcher.clear();
        assert_eq!(dispatcher.subscriber_count(), 0);
    }
}
