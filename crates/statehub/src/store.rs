#![forbid(unsafe_code)]

//! Public facade over the registry and the commit path.
//!
//! # Design
//!
//! [`GlobalStore`] is the surface the surrounding UI framework talks to:
//! attach/detach at mount/unmount, tracked views for application code, batch
//! writes via [`set_state`](GlobalStore::set_state), seeding via
//! [`initialize`](GlobalStore::initialize), and full snapshots via
//! [`get_state`](GlobalStore::get_state).
//!
//! The store is cheaply cloneable; clones share the same registry. The
//! intended usage is one shared instance per process, created at application
//! start and passed by reference into whatever owns subscriber attachment.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::CommitError;
use crate::handle::{HandleId, SubscriberHandle};
use crate::propagate::{self, CommitOptions, Update};
use crate::registry::StateRegistry;
use crate::trace::WriteTraceSink;
use crate::view::StoreView;

/// Default label for handles attached without one.
const ANONYMOUS_LABEL: &str = "subscriber";

/// Shared global-state store.
#[derive(Clone, Default)]
pub struct GlobalStore {
    pub(crate) registry: Arc<StateRegistry>,
    pub(crate) trace: Option<WriteTraceSink>,
}

impl fmt::Debug for GlobalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalStore")
            .field("keys", &self.registry.snapshot().len())
            .field("subscribers", &self.registry.subscriber_count())
            .field("traced", &self.trace.is_some())
            .finish()
    }
}

impl GlobalStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `initial`.
    #[must_use]
    pub fn with_initial(initial: impl IntoIterator<Item = (String, Value)>) -> Self {
        let store = Self::new();
        store.initialize(initial);
        store
    }

    /// Enable the write-origin trace hook.
    ///
    /// Purely observational: each write records its origin to the sink and
    /// has no effect on state.
    #[must_use]
    pub fn with_trace_sink(mut self, sink: WriteTraceSink) -> Self {
        self.trace = Some(sink);
        self
    }

    /// Seed (or re-seed) the store content. The last initialization wins.
    pub fn initialize(&self, initial: impl IntoIterator<Item = (String, Value)>) {
        self.registry.initialize(initial.into_iter().collect());
    }

    /// Full snapshot of the current state.
    #[must_use]
    pub fn get_state(&self) -> HashMap<String, Value> {
        self.registry.snapshot()
    }

    /// Attach a subscriber with the default label. Called at component
    /// mount; the returned handle stays valid until [`detach`](Self::detach).
    pub fn attach(&self, notify: impl Fn() + Send + Sync + 'static) -> Arc<SubscriberHandle> {
        self.attach_labeled(ANONYMOUS_LABEL, notify)
    }

    /// Attach a subscriber with a human-readable label for logs and traces.
    pub fn attach_labeled(
        &self,
        label: impl Into<String>,
        notify: impl Fn() + Send + Sync + 'static,
    ) -> Arc<SubscriberHandle> {
        let handle = SubscriberHandle::new(label.into(), Box::new(notify));
        self.registry.attach(Arc::clone(&handle));
        handle
    }

    /// Detach the subscriber with `id`. Called at component unmount.
    /// Idempotent: unknown ids are ignored.
    pub fn detach(&self, id: &HandleId) {
        self.registry.detach(id);
    }

    /// Tracked read/write accessor bound to `handle`.
    #[must_use]
    pub fn view(&self, handle: &Arc<SubscriberHandle>) -> StoreView {
        StoreView::new(self.clone(), Arc::clone(handle))
    }

    /// Apply a batch of updates with default options.
    ///
    /// Pending values resolve concurrently before anything is written; once
    /// all keys are concrete the batch commits and exactly the attached
    /// handles whose tracked set intersects the batch keys are notified,
    /// `origin` included. A pending failure aborts the whole batch.
    pub async fn set_state(
        &self,
        origin: &Arc<SubscriberHandle>,
        updates: impl IntoIterator<Item = (String, Update)>,
    ) -> Result<(), CommitError> {
        self.set_state_with(origin, updates, CommitOptions::default())
            .await
    }

    /// Apply a batch of updates with explicit [`CommitOptions`].
    pub async fn set_state_with(
        &self,
        origin: &Arc<SubscriberHandle>,
        updates: impl IntoIterator<Item = (String, Update)>,
        options: CommitOptions,
    ) -> Result<(), CommitError> {
        let updates: Vec<(String, Update)> = updates.into_iter().collect();
        if let Some(sink) = &self.trace {
            let keys: Vec<String> = updates.iter().map(|(key, _)| key.clone()).collect();
            sink.record(origin, &keys);
        }
        let resolved = propagate::resolve(updates, options.timeout).await?;
        propagate::commit_resolved(&self.registry, origin, resolved);
        Ok(())
    }
}
