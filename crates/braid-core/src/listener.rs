//! Listener sets.
//!
//! A listener set is an identity-keyed collection of callbacks with O(1)
//! add and remove. Fan-out snapshots the current callbacks before iterating,
//! so listeners may add or remove listeners (including themselves) during
//! dispatch, and a panicking listener never prevents the rest from running.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

/// Handle identifying a registered listener within its set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entries<T> {
    next_id: u64,
    callbacks: HashMap<u64, Callback<T>>,
}

/// An identity-keyed set of callbacks.
pub struct ListenerSet<T> {
    entries: Mutex<Entries<T>>,
}

impl<T> ListenerSet<T> {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Mutex::new(Entries { next_id: 0, callbacks: HashMap::new() }) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries<T>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a callback and returns its removal handle.
    pub fn add(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let mut entries = self.lock();
        let id = entries.next_id;
        entries.next_id += 1;
        entries.callbacks.insert(id, Arc::new(callback));
        ListenerId(id)
    }

    /// Removes a previously registered callback. Unknown ids are ignored.
    pub fn remove(&self, id: ListenerId) {
        self.lock().callbacks.remove(&id.0);
    }

    /// True when no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().callbacks.is_empty()
    }

    /// Drops every registered callback.
    pub fn clear(&self) {
        self.lock().callbacks.clear();
    }

    /// Invokes every registered callback with `value`.
    ///
    /// Each invocation is isolated: a panic is logged and swallowed, and the
    /// remaining callbacks still run.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self.lock().callbacks.values().cloned().collect();
        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
                tracing::error!("listener panicked during dispatch");
            }
        }
    }
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
