//! Derived cells.
//!
//! A [`Derived`] is a memoized value computed over other cells.
//!
//! # How Deriveds Work
//!
//! 1. The first read runs the compute closure inside a deriving frame,
//!    recording every trackable read transitively. The result is cached and
//!    the cell subscribes to the will-notify stream of each dependency.
//!
//! 2. When any current dependency's will-notify fires, the cell re-derives
//!    immediately: the cache is replaced, the dependency set is rebuilt from
//!    scratch (branches taken may differ between runs), stale subscriptions
//!    are dropped and fresh ones established, and the cell's own will-notify
//!    fires with the new value. Re-derivation happens during batch settle,
//!    before any observer is dispatched, so observers never read a stale
//!    derived value.
//!
//! 3. Reading a derived cell inside a tracking or deriving context
//!    propagates its dependency set: observers end up linked to the
//!    ultimate trackables, not to the intermediate cell.
//!
//! Cloning a `Derived` returns a handle to the same cell.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use indexmap::IndexSet;
use smallvec::SmallVec;
use tracing::trace;

use super::context;
use super::emitter::{Emitter, Subscription};
use super::id::CellId;
use super::manager;

struct DerivedInner<T> {
    label: Option<&'static str>,
    compute: Box<dyn Fn() -> T>,
    value: Option<T>,
    /// Trackable ids observed during the last derivation.
    dep_ids: IndexSet<CellId>,
    /// Guards for the dependency will-notify subscriptions; replaced
    /// wholesale on every derivation.
    dep_subs: SmallVec<[Subscription; 4]>,
    will_notify: Emitter<T>,
}

/// A memoized computed value with a dynamically-discovered dependency set.
pub struct Derived<T>
where
    T: Clone + 'static,
{
    inner: Rc<RefCell<DerivedInner<T>>>,
}

impl<T> Derived<T>
where
    T: Clone + 'static,
{
    /// Create a derived cell. The computation does not run until the first
    /// read.
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        Self::build(None, compute)
    }

    /// Create a derived cell carrying a diagnostic label.
    pub fn labeled(label: &'static str, compute: impl Fn() -> T + 'static) -> Self {
        Self::build(Some(label), compute)
    }

    fn build(label: Option<&'static str>, compute: impl Fn() -> T + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(DerivedInner {
                label,
                compute: Box::new(compute),
                value: None,
                dep_ids: IndexSet::new(),
                dep_subs: SmallVec::new(),
                will_notify: Emitter::new(),
            })),
        }
    }

    /// Read the current value, computing it on first access.
    ///
    /// Inside a tracking context the read registers the subscription under
    /// every dependency of this cell; inside a deriving context the whole
    /// dependency set is folded into the enclosing derivation.
    pub fn get(&self) -> T {
        if self.inner.borrow().value.is_none() {
            Self::rederive(&self.inner);
        }

        let inner = self.inner.borrow();
        let value = inner
            .value
            .clone()
            .expect("derived cell has a value after derivation");

        if let Some(tracking_id) = manager::tracking_id() {
            for id in &inner.dep_ids {
                manager::register_cell_subscriber(*id, tracking_id);
            }
        }
        context::record_transitive(&inner.dep_ids, || inner.will_notify.hook());

        value
    }

    /// Whether the cell has been computed at least once.
    pub fn has_value(&self) -> bool {
        self.inner.borrow().value.is_some()
    }

    /// Subscribe to the will-notify stream, fired on every re-derivation
    /// with the freshly computed value.
    pub fn subscribe_will_notify(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.inner.borrow().will_notify.subscribe(callback)
    }

    /// Run the compute closure inside a deriving frame, replace the cache
    /// and dependency set, fire will-notify, and re-subscribe to the new
    /// dependencies.
    fn rederive(inner_rc: &Rc<RefCell<DerivedInner<T>>>) {
        let (new_value, frame) = context::with_deriving(|| {
            let inner = inner_rc.borrow();
            (inner.compute)()
        });

        let will_notify = {
            let mut inner = inner_rc.borrow_mut();
            trace!(
                label = inner.label.unwrap_or(""),
                deps = frame.cell_ids.len(),
                "derived"
            );
            inner.value = Some(new_value.clone());
            inner.dep_ids = frame.cell_ids;
            inner.will_notify.clone()
        };

        // Downstream deriveds re-derive here and read the fresh cache.
        will_notify.emit(&new_value);

        let mut dep_subs = SmallVec::new();
        for hook in &frame.sources {
            let weak = Rc::downgrade(inner_rc);
            dep_subs.push(hook.subscribe(Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    Self::rederive(&inner);
                }
            })));
        }
        inner_rc.borrow_mut().dep_subs = dep_subs;
    }
}

impl<T> Clone for Derived<T>
where
    T: Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Derived<T>
where
    T: Clone + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Derived")
            .field("label", &inner.label)
            .field("value", &inner.value)
            .field("deps", &inner.dep_ids.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
