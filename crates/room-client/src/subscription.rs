//! Listener registration with owned unsubscribe handles.
//!
//! Every collaborator that emits events exposes a `subscribe` operation
//! returning a [`Subscription`]. Dropping the handle (or calling
//! [`Subscription::unsubscribe`]) removes the listener, so a controller that
//! keeps its handles in a [`SubscriptionSet`] can tear down every listener of
//! a connection cycle with a single [`SubscriptionSet::clear`].

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Event listener callback.
pub type Listener<E> = Arc<dyn Fn(E) + Send + Sync>;

/// Owned unsubscribe handle. The listener is removed on drop.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Create a subscription that runs `unsubscribe` exactly once.
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn noop() -> Self {
        Self { unsubscribe: None }
    }

    /// Remove the listener now.
    pub fn unsubscribe(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Subscriptions owned for the lifetime of one connection cycle.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Unsubscribe every handle in the set.
    pub fn clear(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

struct EmitterInner<E> {
    next_id: u64,
    listeners: Vec<(u64, Listener<E>)>,
}

/// Listener registry for collaborator implementations.
///
/// Listeners are invoked synchronously, in registration order, outside the
/// registry lock, so a listener may subscribe or unsubscribe re-entrantly.
pub struct EventEmitter<E> {
    inner: Arc<Mutex<EmitterInner<E>>>,
}

impl<E> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(EmitterInner {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }
}

impl<E> EventEmitter<E> {
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }
}

impl<E> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<E: Clone + Send + 'static> EventEmitter<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; it stays registered until the returned handle
    /// is dropped or unsubscribed.
    pub fn subscribe(&self, listener: Listener<E>) -> Subscription {
        let id = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, listener));
            id
        };

        let weak: Weak<Mutex<EmitterInner<E>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .listeners
                    .retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    /// Deliver `event` to every registered listener.
    pub fn emit(&self, event: E) {
        let listeners: Vec<Listener<E>> = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(event.clone());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_listener(counter: &Arc<AtomicUsize>) -> Listener<u32> {
        let counter = Arc::clone(counter);
        Arc::new(move |value: u32| {
            counter.fetch_add(value as usize, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_reaches_every_listener() {
        let emitter = EventEmitter::<u32>::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let _a = emitter.subscribe(counting_listener(&counter));
        let _b = emitter.subscribe(counting_listener(&counter));
        emitter.emit(2);

        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(emitter.listener_count(), 2);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let emitter = EventEmitter::<u32>::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let sub = emitter.subscribe(counting_listener(&counter));
        drop(sub);
        emitter.emit(1);

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_subscription_set_clear_prevents_duplicate_delivery() {
        let emitter = EventEmitter::<u32>::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut set = SubscriptionSet::new();

        // First cycle
        set.push(emitter.subscribe(counting_listener(&counter)));
        // Reconnect: tear down before re-registering
        set.clear();
        assert!(set.is_empty());
        set.push(emitter.subscribe(counting_listener(&counter)));

        emitter.emit(1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_unsubscribe_after_emitter_dropped_is_harmless() {
        let emitter = EventEmitter::<u32>::new();
        let sub = emitter.subscribe(Arc::new(|_| {}));
        drop(emitter);
        sub.unsubscribe();
    }

    #[test]
    fn test_listener_may_unsubscribe_reentrantly() {
        let emitter = EventEmitter::<u32>::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let slot_clone = Arc::clone(&slot);
        let calls_clone = Arc::clone(&calls);
        let sub = emitter.subscribe(Arc::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            let taken = slot_clone.lock().unwrap().take();
            drop(taken);
        }));
        *slot.lock().unwrap() = Some(sub);

        emitter.emit(1);
        emitter.emit(1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_debug_reports_listener_count_for_any_event_type() {
        #[allow(dead_code)]
        struct Opaque;

        let emitter = EventEmitter::<Opaque>::default();
        assert_eq!(emitter.listener_count(), 0);
        assert_eq!(format!("{emitter:?}"), "EventEmitter { listeners: 0 }");
    }
}
