//! Trackable cells.
//!
//! A [`Trackable`] is the fundamental storage primitive: a mutable,
//! equatable value slot with a stable identity.
//!
//! # How Trackables Work
//!
//! 1. When a cell is read inside a tracking context, the context's
//!    subscription is registered as waiting on the cell's next change; when
//!    read inside a deriving context, the cell joins the derivation's
//!    dependency set.
//!
//! 2. A write that changes the value (or is forced) emits the did-set
//!    stream, resolves the waiting subscriptions into the batching engine,
//!    and arms a will-notify emission that fires once per settled batch with
//!    the final committed value. Multiple writes to the same cell in one
//!    batch coalesce into a single emission.
//!
//! 3. Writing a value equal to the current one is a no-op unless forced.
//!
//! Cells are mutated only through a store's update entry point; there is no
//! public setter. Cloning a `Trackable` returns a handle to the same cell.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use tracing::trace;

use super::context;
use super::emitter::{Emitter, NotifyHook, Subscription};
use super::id::CellId;
use super::manager;

struct TrackableInner<T> {
    id: Option<CellId>,
    label: Option<&'static str>,
    value: T,
    /// Whether a will-notify emission is queued for the open batch.
    armed: bool,
    did_set: Emitter<T>,
    will_notify: Emitter<T>,
}

/// A mutable, equatable, identity-bearing storage cell.
pub struct Trackable<T>
where
    T: Clone + PartialEq + 'static,
{
    inner: Rc<RefCell<TrackableInner<T>>>,
}

impl<T> Trackable<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a cell with the given initial value.
    pub fn new(value: T) -> Self {
        Self::build(None, value)
    }

    /// Create a cell carrying a diagnostic label, surfaced in traces and
    /// `Debug` output.
    pub fn labeled(label: &'static str, value: T) -> Self {
        Self::build(Some(label), value)
    }

    fn build(label: Option<&'static str>, value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(TrackableInner {
                id: None,
                label,
                value,
                armed: false,
                did_set: Emitter::new(),
                will_notify: Emitter::new(),
            })),
        }
    }

    /// The cell's identity, assigned on first use and stable afterwards.
    pub fn id(&self) -> CellId {
        self.ensure_id()
    }

    fn ensure_id(&self) -> CellId {
        let mut inner = self.inner.borrow_mut();
        match inner.id {
            Some(id) => id,
            None => {
                let id = CellId::next();
                inner.id = Some(id);
                id
            }
        }
    }

    fn will_notify_hook(&self) -> NotifyHook {
        self.inner.borrow().will_notify.hook()
    }

    /// Read the current value.
    ///
    /// Registers the read with any active tracking or deriving context.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Read the current value by reference, without cloning.
    ///
    /// Registers the read like [`get`](Self::get).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let id = self.ensure_id();
        if let Some(tracking_id) = manager::tracking_id() {
            manager::register_cell_subscriber(id, tracking_id);
        }
        context::record(id, || self.will_notify_hook());
        f(&self.inner.borrow().value)
    }

    /// Read the current value without registering with any context.
    pub fn get_untracked(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Assign a new value.
    ///
    /// No-op when the value is unchanged and `forced` is false. Otherwise
    /// emits did-set, arms the once-per-batch will-notify emission, and
    /// resolves all waiting subscriptions into the batching engine. Outside
    /// a batch the will-notify emission and the subscribers run inline, in
    /// that order.
    pub(crate) fn write(&self, new_value: T, forced: bool) {
        let id = self.ensure_id();
        {
            let inner = self.inner.borrow();
            if !forced && inner.value == new_value {
                return;
            }
            trace!(?id, label = inner.label.unwrap_or(""), forced, "write");
        }

        let did_set = {
            let mut inner = self.inner.borrow_mut();
            inner.value = new_value.clone();
            inner.did_set.clone()
        };
        did_set.emit(&new_value);

        self.arm_will_notify(id);

        if let Some(waiting) = manager::take_cell_subscribers(id) {
            manager::notify(waiting);
        }
    }

    /// Arm the will-notify emission for the open batch, or fire it inline
    /// when no batch is open. A cell already armed stays armed: repeated
    /// writes coalesce into one emission carrying the final value.
    fn arm_will_notify(&self, id: CellId) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.armed {
                return;
            }
            inner.armed = true;
        }

        let cell = Rc::clone(&self.inner);
        let fire = Box::new(move || {
            let (will_notify, value) = {
                let mut inner = cell.borrow_mut();
                inner.armed = false;
                (inner.will_notify.clone(), inner.value.clone())
            };
            trace!(?id, "will-notify");
            will_notify.emit(&value);
        });

        if let Some(fire) = manager::arm_will_notify(fire) {
            fire();
        }
    }

    /// Subscribe to the did-set stream, fired on every accepted write.
    pub fn subscribe_did_set(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.inner.borrow().did_set.subscribe(callback)
    }

    /// Subscribe to the will-notify stream, fired once per settled batch
    /// with the final committed value.
    pub fn subscribe_will_notify(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.inner.borrow().will_notify.subscribe(callback)
    }
}

impl<T> Clone for Trackable<T>
where
    T: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Trackable<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Trackable")
            .field("id", &inner.id)
            .field("label", &inner.label)
            .field("value", &inner.value)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn get_and_write() {
        let cell = Trackable::new(0);
        assert_eq!(cell.get(), 0);

        cell.write(42, false);
        assert_eq!(cell.get(), 42);
    }

    #[test]
    fn id_is_stable() {
        let cell = Trackable::new(0);
        let id = cell.id();
        cell.write(1, false);
        let _ = cell.get();
        assert_eq!(cell.id(), id);
    }

    #[test]
    fn distinct_cells_have_distinct_ids() {
        let a = Trackable::new(0);
        let b = Trackable::new(0);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn equal_write_is_a_no_op() {
        let cell = Trackable::new(5);
        let did_set = Rc::new(Cell::new(0));

        let did_set_clone = did_set.clone();
        let _sub = cell.subscribe_did_set(move |_| did_set_clone.set(did_set_clone.get() + 1));

        cell.write(5, false);
        assert_eq!(did_set.get(), 0);

        cell.write(6, false);
        assert_eq!(did_set.get(), 1);
    }

    #[test]
    fn forced_write_emits_even_when_equal() {
        let cell = Trackable::new(5);
        let did_set = Rc::new(Cell::new(0));

        let did_set_clone = did_set.clone();
        let _sub = cell.subscribe_did_set(move |_| did_set_clone.set(did_set_clone.get() + 1));

        cell.write(5, true);
        assert_eq!(did_set.get(), 1);
    }

    #[test]
    fn unbatched_write_fires_will_notify_before_subscribers() {
        let cell = Trackable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let log_clone = log.clone();
        let _sub = cell.subscribe_will_notify(move |v| log_clone.borrow_mut().push(("will", *v)));

        let log_clone = log.clone();
        let ((), _id) = manager::with_tracking(
            || {
                let _ = cell.get();
            },
            move || log_clone.borrow_mut().push(("subscriber", -1)),
        );

        cell.write(9, false);
        assert_eq!(*log.borrow(), vec![("will", 9), ("subscriber", -1)]);
    }

    #[test]
    fn batched_writes_coalesce_will_notify() {
        let cell = Trackable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let log_clone = log.clone();
        let _sub = cell.subscribe_will_notify(move |v| log_clone.borrow_mut().push(*v));

        manager::batch(|| {
            cell.write(1, false);
            cell.write(2, false);
            cell.write(3, false);
        });

        // One emission, carrying the final committed value.
        assert_eq!(*log.borrow(), vec![3]);
    }

    #[test]
    fn did_set_fires_per_write_even_in_a_batch() {
        let cell = Trackable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let log_clone = log.clone();
        let _sub = cell.subscribe_did_set(move |v| log_clone.borrow_mut().push(*v));

        manager::batch(|| {
            cell.write(1, false);
            cell.write(2, false);
        });

        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn debug_includes_label_and_value() {
        let cell = Trackable::labeled("zoom", 100);
        let formatted = format!("{:?}", cell);
        assert!(formatted.contains("zoom"));
        assert!(formatted.contains("100"));
    }
}
