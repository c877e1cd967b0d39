#![forbid(unsafe_code)]

//! Composition-based connect wrapper for component lifecycles.
//!
//! Rather than subclassing a component to inject mount/unmount behavior,
//! [`Connected`] owns the wrapped unit and invokes its [`Lifecycle`] hooks
//! explicitly around the attach/detach bookkeeping: attach first, then
//! `on_attach`; detach first, then `on_detach`.

use std::sync::Arc;

use crate::error::CommitError;
use crate::handle::SubscriberHandle;
use crate::propagate::Update;
use crate::store::GlobalStore;
use crate::view::StoreView;

/// Mount/unmount hooks of a wrapped component. Both hooks default to no-ops.
pub trait Lifecycle {
    /// Runs right after the component is attached to the store.
    fn on_attach(&mut self) {}

    /// Runs right after the component is detached from the store.
    fn on_detach(&mut self) {}
}

/// A component connected to the global store for its mounted lifetime.
///
/// The handle's label is the component's type name, so logs and traces read
/// like `SettingsPanel` rather than an opaque id.
#[derive(Debug)]
pub struct Connected<C: Lifecycle> {
    component: C,
    handle: Arc<SubscriberHandle>,
    store: GlobalStore,
}

impl<C: Lifecycle> Connected<C> {
    /// Attach `component` to `store` and run its `on_attach` hook.
    ///
    /// `notify` is the re-render signal invoked whenever a key this
    /// component has read or written changes.
    pub fn mount(
        store: &GlobalStore,
        component: C,
        notify: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let handle = store.attach_labeled(short_type_name::<C>(), notify);
        let mut connected = Self {
            component,
            handle,
            store: store.clone(),
        };
        connected.component.on_attach();
        connected
    }

    /// Detach from the store, run `on_detach`, and give the component back.
    pub fn unmount(mut self) -> C {
        self.store.detach(self.handle.id());
        self.component.on_detach();
        self.component
    }

    /// Tracked accessor for this component's reads and writes.
    #[must_use]
    pub fn view(&self) -> StoreView {
        self.store.view(&self.handle)
    }

    /// Batch write with this component as the origin.
    pub async fn set_state(
        &self,
        updates: impl IntoIterator<Item = (String, Update)>,
    ) -> Result<(), CommitError> {
        self.store.set_state(&self.handle, updates).await
    }

    /// The attachment record backing this connection.
    #[must_use]
    pub fn handle(&self) -> &Arc<SubscriberHandle> {
        &self.handle
    }

    /// The wrapped component.
    #[must_use]
    pub fn component(&self) -> &C {
        &self.component
    }

    /// Mutable access to the wrapped component.
    pub fn component_mut(&mut self) -> &mut C {
        &mut self.component
    }
}

/// Last path segment of the type name, without generic arguments.
fn short_type_name<C>() -> &'static str {
    let full = std::any::type_name::<C>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
