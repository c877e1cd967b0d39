#![forbid(unsafe_code)]

//! Subscriber identity, tracked-key bookkeeping, and notification delivery.
//!
//! # Design
//!
//! A [`SubscriberHandle`] is the attachment record for one live consumer of
//! the store. The registry holds it behind `Arc` for the duration of the
//! attachment; the mounting framework owns the other reference and drops it
//! at unmount.
//!
//! Tracked keys are **sticky**: the set grows on every read or write through
//! the handle's view and is cleared only on detach, never between renders.
//! A component that once read a key keeps re-rendering for that key as long
//! as it stays attached; in a large app this over-notifies rather than
//! under-notifies.
//!
//! # Invariants
//!
//! 1. A key enters the tracked set only on a read or write through this
//!    handle's view (lazy, never eager).
//! 2. `notify` runs only while `attached` is true.
//! 3. A panic inside one handle's callback never prevents delivery to the
//!    remaining handles.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

/// Unique identifier of an attached subscriber.
///
/// Stable for the attachment's lifetime. Ids of detached handles may be
/// reused by the surrounding framework; uniqueness is only promised among
/// currently attached handles.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HandleId(Uuid);

impl HandleId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandleId({})", self.0)
    }
}

/// One attached consumer of the global store.
///
/// Carries the notification callback (a zero-argument "re-render now"
/// signal), the sticky tracked-key set that decides notification
/// eligibility, and a local mirror of the values committed through this
/// handle.
pub struct SubscriberHandle {
    id: HandleId,
    label: String,
    tracked: Mutex<HashSet<String>>,
    attached: AtomicBool,
    mirror: Mutex<HashMap<String, Value>>,
    notify: Box<dyn Fn() + Send + Sync>,
}

impl fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("attached", &self.is_attached())
            .field("tracked", &self.tracked.lock().len())
            .finish_non_exhaustive()
    }
}

impl SubscriberHandle {
    pub(crate) fn new(label: String, notify: Box<dyn Fn() + Send + Sync>) -> Arc<Self> {
        Arc::new(Self {
            id: HandleId::new(),
            label,
            tracked: Mutex::new(HashSet::new()),
            attached: AtomicBool::new(true),
            mirror: Mutex::new(HashMap::new()),
            notify,
        })
    }

    /// This handle's identifier.
    #[must_use]
    pub fn id(&self) -> &HandleId {
        &self.id
    }

    /// Human-readable name carried into logs and traces.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the handle is still attached to the registry.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Snapshot of the keys this handle currently watches.
    #[must_use]
    pub fn tracked_keys(&self) -> HashSet<String> {
        self.tracked.lock().clone()
    }

    /// Snapshot of the handle's local reflection: the last values committed
    /// with this handle as the write origin.
    #[must_use]
    pub fn reflected(&self) -> HashMap<String, Value> {
        self.mirror.lock().clone()
    }

    pub(crate) fn track(&self, key: &str) {
        let mut tracked = self.tracked.lock();
        if !tracked.contains(key) {
            tracked.insert(key.to_string());
        }
    }

    pub(crate) fn tracks_any(&self, keys: &[String]) -> bool {
        let tracked = self.tracked.lock();
        keys.iter().any(|key| tracked.contains(key))
    }

    pub(crate) fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::Release);
    }

    pub(crate) fn clear_tracked(&self) {
        self.tracked.lock().clear();
    }

    pub(crate) fn reflect(&self, entries: &[(String, Value)]) {
        let mut mirror = self.mirror.lock();
        for (key, value) in entries {
            mirror.insert(key.clone(), value.clone());
        }
    }

    /// Invoke the notification callback, isolating panics.
    ///
    /// Re-checks liveness so a handle detached between recipient collection
    /// and delivery is skipped.
    pub(crate) fn invoke_notify(&self) {
        if !self.is_attached() {
            return;
        }
        if catch_unwind(AssertUnwindSafe(|| (self.notify)())).is_err() {
            warn!(
                handle = %self.id,
                label = %self.label,
                "notify callback panicked; continuing delivery"
            );
        }
    }
}
