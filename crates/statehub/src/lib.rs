#![forbid(unsafe_code)]

//! Cross-component global state with tracked reads and selective
//! notification.
//!
//! # Role
//! `statehub` is the state layer for a component framework: components
//! attach to one shared [`GlobalStore`], read and write it through a
//! per-component [`StoreView`], and are re-rendered only when a key they
//! actually touched changes.
//!
//! # Primary responsibilities
//! - **[`StateRegistry`]**: canonical `key -> value` map plus the attached
//!   subscriber list.
//! - **[`StoreView`]**: tracked per-handle accessor; reads and writes record
//!   interest in a key.
//! - **Commit path** ([`propagate`]): batch writes resolve pending values
//!   first, then commit atomically with respect to notification ordering and
//!   signal exactly the subscribers whose tracked keys intersect the batch.
//! - **[`Connected`]**: composition wrapper gluing a component's
//!   mount/unmount lifecycle to attach/detach.
//!
//! # How it fits in the system
//! The rendering framework is an external collaborator: it calls
//! [`GlobalStore::attach`] at mount and [`GlobalStore::detach`] at unmount,
//! and supplies a callback invoked with no arguments to mean "re-render
//! now". Nothing here schedules, persists, or renders.
//!
//! # Example
//! ```
//! use statehub::{GlobalStore, Update};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), statehub::CommitError> {
//! let store = GlobalStore::with_initial([("count".to_string(), json!(0))]);
//! let handle = store.attach(|| { /* re-render */ });
//!
//! let view = store.view(&handle);
//! assert_eq!(view.read("count"), Some(json!(0)));
//!
//! store
//!     .set_state(&handle, [("count".to_string(), Update::ready(1))])
//!     .await?;
//! assert_eq!(store.get_state()["count"], json!(1));
//! # Ok(())
//! # }
//! ```

pub mod connect;
pub mod error;
pub mod handle;
pub mod propagate;
pub mod registry;
pub mod store;
pub mod trace;
pub mod view;

pub use connect::{Connected, Lifecycle};
pub use error::{BoxError, CommitError};
pub use handle::{HandleId, SubscriberHandle};
pub use propagate::{CommitOptions, Update};
pub use registry::StateRegistry;
pub use store::GlobalStore;
pub use trace::{TraceDestination, WriteTraceConfig, WriteTraceSink};
pub use view::StoreView;

// The dynamic value type carried by the store.
pub use serde_json::Value;
