#![forbid(unsafe_code)]

//! Canonical state and the attached-subscriber list.
//!
//! # Design
//!
//! [`StateRegistry`] owns the process-wide `key -> value` map and the list
//! of attached [`SubscriberHandle`]s behind a single `RwLock`. It exposes
//! only primitive operations: raw get/set with no notification, full
//! replacement via [`initialize`](StateRegistry::initialize), snapshots, and
//! attach/detach bookkeeping. The commit/notify algorithm is layered on top
//! in [`propagate`](crate::propagate).
//!
//! # Invariants
//!
//! 1. Exactly one entry per key; a raw `set` overwrites unconditionally
//!    (last writer wins).
//! 2. `initialize` replaces the whole map. It is intended to run once before
//!    the first attachment but tolerates being called at any time; the last
//!    initialization wins and no error is raised on late calls.
//! 3. `detach` is idempotent: an unknown id is a no-op.
//! 4. Subscribers are kept in attachment order.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

use crate::handle::{HandleId, SubscriberHandle};

struct RegistryInner {
    state: HashMap<String, Value>,
    subscribers: Vec<Arc<SubscriberHandle>>,
}

/// Process-wide mutable mapping from key to value plus the set of currently
/// attached subscriber handles.
///
/// Constructed once at application start and shared by reference for the
/// process lifetime. All mutation flows through this type or the commit path
/// built on it; the lock is never held across user callbacks.
pub struct StateRegistry {
    inner: RwLock<RegistryInner>,
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StateRegistry {
    /// Create an empty registry with no state and no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                state: HashMap::new(),
                subscribers: Vec::new(),
            }),
        }
    }

    /// Replace the entire store content with `initial`.
    ///
    /// Later calls fully replace prior state (no merge). Subscribers and
    /// their tracked sets are untouched and nobody is notified.
    pub fn initialize(&self, initial: HashMap<String, Value>) {
        let keys = initial.len();
        self.inner.write().state = initial;
        info!(keys, "global state initialized");
    }

    /// Current value for `key`, or `None` when absent.
    ///
    /// Absence is not an error here and the key is not declared; emitting
    /// the undeclared-key warning is the view's responsibility.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().state.get(key).cloned()
    }

    /// Raw overwrite with no notification.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner.write().state.insert(key.into(), value);
    }

    /// Read-only copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.inner.read().state.clone()
    }

    /// Number of currently attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.read().subscribers.len()
    }

    pub(crate) fn attach(&self, handle: Arc<SubscriberHandle>) {
        debug!(handle = %handle.id(), label = handle.label(), "subscriber attached");
        self.inner.write().subscribers.push(handle);
    }

    /// Remove the subscriber with `id` from the list.
    ///
    /// Flips the handle's liveness flag and clears its tracked set so a
    /// retained handle cannot receive late notifications. Unknown ids are
    /// ignored.
    pub(crate) fn detach(&self, id: &HandleId) {
        let removed = {
            let mut inner = self.inner.write();
            let position = inner.subscribers.iter().position(|h| h.id() == id);
            position.map(|at| inner.subscribers.remove(at))
        };
        match removed {
            Some(handle) => {
                handle.set_attached(false);
                handle.clear_tracked();
                debug!(handle = %id, label = handle.label(), "subscriber detached");
            }
            None => debug!(handle = %id, "detach of unknown handle ignored"),
        }
    }

    /// Write a batch of resolved values and collect the recipients.
    ///
    /// Runs in one write-lock critical section so concurrent batches cannot
    /// interleave their writes with recipient selection. Recipients are the
    /// attached handles whose tracked set intersects `changed`, in
    /// attachment order. Callbacks are invoked by the caller after the lock
    /// is released.
    pub(crate) fn apply(
        &self,
        entries: Vec<(String, Value)>,
        changed: &[String],
    ) -> Vec<Arc<SubscriberHandle>> {
        let mut inner = self.inner.write();
        for (key, value) in entries {
            inner.state.insert(key, value);
        }
        inner
            .subscribers
            .iter()
            .filter(|h| h.is_attached() && h.tracks_any(changed))
            .cloned()
            .collect()
    }
}
