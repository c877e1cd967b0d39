#![forbid(unsafe_code)]

//! Error taxonomy for the commit path.
//!
//! Reads never fail (an absent key is a warning, not an error), and detaching
//! an unknown handle is a no-op. The only fallible operation is committing a
//! batch that contains pending values.

use std::time::Duration;

use thiserror::Error;

/// Boxed error produced by a pending update value that failed to resolve.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a state commit.
///
/// A failed batch is applied atomically: when any key's pending value fails
/// or times out, no key from that batch is written and no subscriber is
/// notified.
#[derive(Debug, Error)]
pub enum CommitError {
    /// A pending update value resolved to an error.
    #[error("pending value for key '{key}' failed: {source}")]
    PendingValue {
        /// The key whose value failed to resolve.
        key: String,
        /// The underlying resolution error.
        #[source]
        source: BoxError,
    },

    /// A pending update value did not resolve within the configured bound.
    #[error("pending value for key '{key}' timed out after {timeout:?}")]
    Timeout {
        /// The key whose value timed out.
        key: String,
        /// The bound that was exceeded.
        timeout: Duration,
    },
}
