#![forbid(unsafe_code)]

//! Batch update values, asynchronous resolution, and the commit/notify
//! algorithm.
//!
//! # Design
//!
//! A commit runs in two steps:
//!
//! 1. **Resolve**: every [`Update::Pending`] value in the batch is awaited
//!    concurrently (optionally bounded by a per-key timeout). The commit
//!    does not proceed until all of them have concrete values. A single
//!    failure or timeout fails the whole batch: nothing is written and
//!    nobody is notified.
//! 2. **Commit**: all resolved values are written into the origin handle's
//!    local reflection and the shared registry inside one write-lock
//!    critical section, recipients are selected (attached handles whose
//!    tracked set intersects the batch keys, origin included), the lock is
//!    released, and each recipient's callback runs.
//!
//! Reads and ready-only batches never suspend, so the synchronous
//! [`commit_resolved`] path is usable without an async runtime.
//!
//! # Ordering
//!
//! Within one commit, every notification happens after every value of that
//! batch is written; there is no partial-state notification. Across
//! commits there is no ordering guarantee: two batches touching the same
//! key race and the last one to reach step 2 wins.
//!
//! # Failure Modes
//!
//! - **Pending value fails/times out**: the batch is dropped atomically and
//!   the error is returned to the writer.
//! - **Recipient callback panics**: contained per handle; delivery to the
//!   remaining recipients continues.

use std::fmt;
use std::time::Duration;

use futures::future::{BoxFuture, join_all};
use serde_json::Value;
use tracing::debug;

use crate::error::{BoxError, CommitError};
use crate::handle::SubscriberHandle;
use crate::registry::StateRegistry;

/// One value in a batch update: either concrete or still being produced.
pub enum Update {
    /// A concrete value, committed as-is.
    Ready(Value),
    /// A value still being produced. The commit suspends until it resolves.
    Pending(BoxFuture<'static, Result<Value, BoxError>>),
}

impl Update {
    /// Wrap a concrete value.
    pub fn ready(value: impl Into<Value>) -> Self {
        Self::Ready(value.into())
    }

    /// Wrap a future producing the value.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }
}

impl From<Value> for Update {
    fn from(value: Value) -> Self {
        Self::Ready(value)
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Pending(_) => f.debug_tuple("Pending").finish_non_exhaustive(),
        }
    }
}

/// Knobs for one commit call.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitOptions {
    /// Upper bound on resolving each pending value. `None` waits
    /// indefinitely, matching the default behavior.
    pub timeout: Option<Duration>,
}

impl CommitOptions {
    /// Bound every pending value in the batch by `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Resolve every pending value in `updates` to a concrete one.
///
/// Pending values resolve concurrently with no ordering dependency between
/// keys. The first failure or timeout aborts the batch.
pub(crate) async fn resolve(
    updates: Vec<(String, Update)>,
    timeout: Option<Duration>,
) -> Result<Vec<(String, Value)>, CommitError> {
    let mut resolved = Vec::with_capacity(updates.len());
    let mut pending = Vec::new();
    for (key, update) in updates {
        match update {
            Update::Ready(value) => resolved.push((key, value)),
            Update::Pending(future) => pending.push((key, future)),
        }
    }

    if !pending.is_empty() {
        let outcomes = join_all(pending.into_iter().map(|(key, future)| async move {
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, future).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        return Err(CommitError::Timeout {
                            key,
                            timeout: limit,
                        });
                    }
                },
                None => future.await,
            };
            match outcome {
                Ok(value) => Ok((key, value)),
                Err(source) => Err(CommitError::PendingValue { key, source }),
            }
        }))
        .await;

        for outcome in outcomes {
            resolved.push(outcome?);
        }
    }

    Ok(resolved)
}

/// Commit a batch of concrete values and notify the affected subscribers.
///
/// Writes go to the origin handle's local reflection and to the shared
/// registry; recipients are selected under the registry lock and their
/// callbacks run after it is released, fire-and-forget.
pub(crate) fn commit_resolved(
    registry: &StateRegistry,
    origin: &SubscriberHandle,
    resolved: Vec<(String, Value)>,
) {
    if resolved.is_empty() {
        return;
    }
    let changed: Vec<String> = resolved.iter().map(|(key, _)| key.clone()).collect();

    origin.reflect(&resolved);
    let recipients = registry.apply(resolved, &changed);
    debug!(
        origin = %origin.id(),
        changed = ?changed,
        recipients = recipients.len(),
        "state batch committed"
    );

    for handle in recipients {
        handle.invoke_notify();
    }
}
