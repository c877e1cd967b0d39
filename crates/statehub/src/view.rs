#![forbid(unsafe_code)]

//! Per-handle read/write proxy over the shared store.
//!
//! Every read through a [`StoreView`] records the key in the owning handle's
//! tracked set before the lookup, and every write routes through the commit
//! path instead of touching the registry directly. Tracking on both read and
//! write means a component that only ever writes a key still reacts when
//! another component writes the same key later.

use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::handle::SubscriberHandle;
use crate::propagate;
use crate::store::GlobalStore;

/// Tracked accessor bound to one subscriber handle.
///
/// This is what application code sees as "global state".
#[derive(Debug, Clone)]
pub struct StoreView {
    store: GlobalStore,
    handle: Arc<SubscriberHandle>,
}

impl StoreView {
    pub(crate) fn new(store: GlobalStore, handle: Arc<SubscriberHandle>) -> Self {
        Self { store, handle }
    }

    /// The handle this view is bound to.
    #[must_use]
    pub fn handle(&self) -> &Arc<SubscriberHandle> {
        &self.handle
    }

    /// Read `key`, recording it in the handle's tracked set.
    ///
    /// A key absent from the store is a developer warning (it was never
    /// seeded), not an error: the read still proceeds and returns `None`.
    #[must_use]
    pub fn read(&self, key: &str) -> Option<Value> {
        self.handle.track(key);
        let value = self.store.registry.get(key);
        if value.is_none() {
            warn!(
                key,
                handle = %self.handle.id(),
                label = self.handle.label(),
                "read of a key that was never declared; seed it with initialize"
            );
        }
        value
    }

    /// Write a single concrete value through the commit path.
    ///
    /// The key joins the handle's tracked set (a writer is also a watcher),
    /// so this handle re-renders when anyone else writes the same key later.
    /// Never suspends: a ready value commits synchronously.
    pub fn write(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        self.handle.track(&key);
        let entry = vec![(key, value.into())];
        if let Some(sink) = &self.store.trace {
            sink.record(&self.handle, &[entry[0].0.clone()]);
        }
        propagate::commit_resolved(&self.store.registry, &self.handle, entry);
    }
}
