//! Synchronous publish/subscribe channel used for every ad lifecycle signal.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Callback stored by a [`Signal`].
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`Signal::subscribe`]; pass it to [`Signal::unsubscribe`]
/// to remove the callback again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

struct Slots<T> {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener<T>)>,
}

/// A broadcast channel with synchronous, in-order delivery.
///
/// Clones share the same subscriber list. `emit` calls every subscriber
/// exactly once, in subscription order, on the caller's thread. The list is
/// snapshotted before delivery, so callbacks may subscribe, unsubscribe or
/// emit again without deadlocking; changes take effect from the next emit.
pub struct Signal<T> {
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 1,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut slots = self.slots();
        let id = SubscriptionId(slots.next_id);
        slots.next_id += 1;
        slots.listeners.push((id, Arc::new(callback)));
        id
    }

    /// Removes a subscriber. Returns `false` if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut slots = self.slots();
        let before = slots.listeners.len();
        slots.listeners.retain(|(existing, _)| *existing != id);
        slots.listeners.len() != before
    }

    pub fn emit(&self, payload: &T) {
        let listeners: Vec<Listener<T>> = self
            .slots()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(payload);
        }
    }

    pub fn len(&self) -> usize {
        self.slots().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slots(&self) -> MutexGuard<'_, Slots<T>> {
        // Listeners run outside the lock.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.len())
            .finish()
    }
}
