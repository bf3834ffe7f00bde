//! Selectors.
//!
//! A [`Selector`] is the observer a UI fragment owns. It carries the props
//! identifying which instance of data the fragment targets, default
//! notification configuration, the owner-invalidation callback, and the
//! named projections created from it.
//!
//! # Lifecycle
//!
//! 1. The fragment constructs the selector with its invalidation callback
//!    and calls [`setup`](Selector::setup) once per render; the first call
//!    binds the props.
//!
//! 2. Projections are created once and read during layout.
//!
//! 3. When the fragment comes to represent a different model object, the
//!    fragment calls [`update`](Selector::update) with the new props; every
//!    projection discards its subscription and re-tracks from scratch.
//!    Equal props are a no-op.
//!
//! 4. Dropping the selector and its projections cancels any in-flight
//!    deferred notification and expires all registry subscriptions.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use super::config::{AnimationPreset, PartialSelectorConfigs, SelectorConfigs};
use super::projection::{Projection, ProjectionInner};
use super::scheduler;

/// Unique identity of a selector; the coalescing key for deferred
/// notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SelectorId(u64);

impl SelectorId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) struct SelectorInner<P> {
    pub(crate) id: SelectorId,
    pub(crate) name: Cell<Option<&'static str>>,
    pub(crate) configs: SelectorConfigs,
    pub(crate) props: RefCell<Option<P>>,
    on_invalidate: Box<dyn Fn(Option<AnimationPreset>)>,
    retracks: RefCell<Vec<Box<dyn Fn()>>>,
}

impl<P> SelectorInner<P> {
    /// Invoke the owner-invalidation callback.
    pub(crate) fn notify_owner(&self, animation: Option<AnimationPreset>) {
        trace!(name = self.name.get().unwrap_or(""), "notify owner");
        (self.on_invalidate)(animation);
    }
}

impl<P> Drop for SelectorInner<P> {
    fn drop(&mut self) {
        scheduler::cancel(self.id);
    }
}

/// A UI-facing observer holding named projections keyed by external props.
pub struct Selector<P>
where
    P: Clone + PartialEq + 'static,
{
    inner: Rc<SelectorInner<P>>,
}

impl<P> Selector<P>
where
    P: Clone + PartialEq + 'static,
{
    /// Create a selector with default configuration `configs` and the
    /// owner's invalidation callback.
    pub fn new(
        configs: SelectorConfigs,
        on_invalidate: impl Fn(Option<AnimationPreset>) + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(SelectorInner {
                id: SelectorId::next(),
                name: Cell::new(None),
                configs,
                props: RefCell::new(None),
                on_invalidate: Box::new(on_invalidate),
                retracks: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Bind the selector to its fragment. Called once per render; the first
    /// call wins for props, later calls only refresh the diagnostic name.
    pub fn setup(&self, name: &'static str, props: P) {
        trace!(name, "selector setup");
        self.inner.name.set(Some(name));
        let mut slot = self.inner.props.borrow_mut();
        if slot.is_none() {
            *slot = Some(props);
        }
    }

    /// Re-key the selector. Every projection discards its subscription and
    /// re-tracks against the new props. Equal props are a no-op: caches stay
    /// untouched and no notification is issued.
    pub fn update(&self, props: P) {
        {
            let mut slot = self.inner.props.borrow_mut();
            if slot.as_ref() == Some(&props) {
                trace!(name = self.inner.name.get().unwrap_or(""), "props unchanged");
                return;
            }
            *slot = Some(props);
        }
        trace!(name = self.inner.name.get().unwrap_or(""), "re-keying");
        for retrack in self.inner.retracks.borrow().iter() {
            retrack();
        }
    }

    /// Create a named projection over the store.
    ///
    /// `select` must be a pure function of the props and the cells it reads.
    pub fn projection<T>(
        &self,
        label: &'static str,
        configs: PartialSelectorConfigs,
        select: impl Fn(&P) -> T + 'static,
    ) -> Projection<P, T>
    where
        T: Clone + PartialEq + 'static,
    {
        let projection = Projection::new(Rc::clone(&self.inner), label, configs, select);

        let weak = projection.downgrade();
        self.inner.retracks.borrow_mut().push(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                ProjectionInner::retrack(&inner);
            }
        }));

        projection
    }

    /// The current props, if `setup` has run.
    pub fn props(&self) -> Option<P> {
        self.inner.props.borrow().clone()
    }

    /// The selector's default configuration.
    pub fn configs(&self) -> SelectorConfigs {
        self.inner.configs
    }
}

impl<P> Clone for Selector<P>
where
    P: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}
