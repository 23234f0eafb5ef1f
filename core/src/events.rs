//! Listener registry for client-side events.
//!
//! Callers that own navigation (redirect to login after a 401) subscribe
//! here instead of polling the session store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Emitted by `ApiClient` on session changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The backend answered 401 and the persisted session was wiped.
    Cleared { status: u16, message: String },
    /// The backend answered 401 but the store refused to drop the session;
    /// the stale token is still persisted.
    ClearFailed { status: u16, message: String },
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct Listeners<T> {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(Subscription, Callback<T>)>>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            callbacks: Mutex::new(Vec::new()),
        }
    }
}

impl<T> std::fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").field("len", &self.len()).finish()
    }
}

impl<T> Listeners<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let subscription = Subscription(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((subscription, Arc::new(callback)));
        subscription
    }

    /// Returns whether the subscription was still registered.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut callbacks = self.lock();
        let before = callbacks.len();
        callbacks.retain(|(id, _)| *id != subscription);
        callbacks.len() != before
    }

    /// Invoke every callback in subscription order.
    ///
    /// The registry lock is released before callbacks run, so a callback may
    /// subscribe or unsubscribe.
    pub fn publish(&self, event: &T) {
        let snapshot: Vec<Callback<T>> = self.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for callback in snapshot {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every critical section leaves the Vec consistent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Vec<(Subscription, Callback<T>)>> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
