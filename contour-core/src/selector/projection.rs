//! Projections.
//!
//! A [`Projection`] is a memoized, re-trackable read over store state, owned
//! by a [`Selector`](super::Selector).
//!
//! # How Projections Work
//!
//! 1. [`get`](Projection::get) returns the cached value when present,
//!    otherwise tracks: the selection function runs inside a fresh tracking
//!    context, so every cell it reads registers the projection as a one-shot
//!    subscriber.
//!
//! 2. When the subscription fires (after the batch that changed an observed
//!    cell has settled), the projection tracks again. A changed value (or
//!    `always_notify`) updates the cache and notifies the owning selector:
//!    inline when `sync_notify` is resolved, otherwise through the deferred
//!    queue, where the newest notification per selector wins. The very first
//!    evaluation never notifies; nothing has been rendered yet.
//!
//! 3. Re-keying the selector discards the subscription and re-tracks from
//!    scratch.
//!
//! Dropping a projection expires its live subscription, so a late firing
//! finds nothing in the registry.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::reactive::id::SubscriptionId;
use crate::reactive::manager;

use super::config::{PartialSelectorConfigs, SelectorConfigs};
use super::scheduler;
use super::selector::SelectorInner;

pub(crate) struct ProjectionInner<P, T> {
    owner: Rc<SelectorInner<P>>,
    label: &'static str,
    configs: PartialSelectorConfigs,
    select: Box<dyn Fn(&P) -> T>,
    value: RefCell<Option<T>>,
    subscription_id: Cell<Option<SubscriptionId>>,
}

impl<P, T> ProjectionInner<P, T>
where
    P: Clone + PartialEq + 'static,
    T: Clone + PartialEq + 'static,
{
    /// Discard the live subscription and track from scratch. Used when the
    /// owning selector is re-keyed.
    pub(crate) fn retrack(this: &Rc<Self>) {
        trace!(label = this.label, "retrack");
        if let Some(id) = this.subscription_id.take() {
            manager::expire(id);
        }
        Self::track(this);
    }

    /// Evaluate the selection inside a fresh tracking context, refresh the
    /// cache, and surface the change to the owner per the resolved configs.
    pub(crate) fn track(this: &Rc<Self>) -> T {
        let configs = SelectorConfigs::resolved(
            manager::notifying_configs(),
            this.configs,
            this.owner.configs,
        );
        let props = this
            .owner
            .props
            .borrow()
            .clone()
            .expect("selector tracked before setup");

        let weak = Rc::downgrade(this);
        let (new_value, subscription_id) = manager::with_tracking(
            || (this.select)(&props),
            move || {
                if let Some(projection) = weak.upgrade() {
                    Self::track(&projection);
                }
            },
        );
        this.subscription_id.set(Some(subscription_id));

        let (first, changed) = {
            let slot = this.value.borrow();
            match slot.as_ref() {
                None => (true, false),
                Some(old) => (false, *old != new_value),
            }
        };

        if first {
            trace!(label = this.label, "tracked initial value");
            *this.value.borrow_mut() = Some(new_value.clone());
        } else if changed || configs.always_notify {
            trace!(label = this.label, sync = configs.sync_notify, "value changed");
            *this.value.borrow_mut() = Some(new_value.clone());

            scheduler::cancel(this.owner.id);
            if configs.sync_notify {
                this.owner.notify_owner(configs.animation);
            } else {
                let owner = Rc::downgrade(&this.owner);
                let animation = configs.animation;
                let notifying = manager::notifying_id();
                scheduler::schedule(
                    this.owner.id,
                    Box::new(move || {
                        if let Some(owner) = owner.upgrade() {
                            trace!(?notifying, "delivering deferred notification");
                            owner.notify_owner(animation);
                        }
                    }),
                );
            }
        } else {
            trace!(label = this.label, "unchanged");
        }

        new_value
    }
}

impl<P, T> Drop for ProjectionInner<P, T> {
    fn drop(&mut self) {
        if let Some(id) = self.subscription_id.take() {
            manager::expire(id);
        }
    }
}

/// A memoized, re-trackable read over store state.
pub struct Projection<P, T>
where
    P: Clone + PartialEq + 'static,
    T: Clone + PartialEq + 'static,
{
    inner: Rc<ProjectionInner<P, T>>,
}

impl<P, T> Projection<P, T>
where
    P: Clone + PartialEq + 'static,
    T: Clone + PartialEq + 'static,
{
    pub(crate) fn new(
        owner: Rc<SelectorInner<P>>,
        label: &'static str,
        configs: PartialSelectorConfigs,
        select: impl Fn(&P) -> T + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(ProjectionInner {
                owner,
                label,
                configs,
                select: Box::new(select),
                value: RefCell::new(None),
                subscription_id: Cell::new(None),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<ProjectionInner<P, T>> {
        Rc::downgrade(&self.inner)
    }

    /// The projection's value: the cache when present, a fresh track
    /// otherwise.
    pub fn get(&self) -> T {
        if let Some(value) = self.inner.value.borrow().clone() {
            return value;
        }
        ProjectionInner::track(&self.inner)
    }

    /// The projection's label.
    pub fn label(&self) -> &'static str {
        self.inner.label
    }
}

impl<P, T> Clone for Projection<P, T>
where
    P: Clone + PartialEq + 'static,
    T: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}
