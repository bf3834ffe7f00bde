//! Change event streams.
//!
//! Every cell exposes its changes through [`Emitter`]s: the did-set stream
//! fires on each accepted write, the will-notify stream fires once per
//! settled batch with the final committed value. Subscribing returns a
//! [`Subscription`] guard that unsubscribes on drop, so an observer's
//! callbacks die with the observer.
//!
//! Emission snapshots the callback list before invoking it, so a callback
//! may freely subscribe, unsubscribe, or emit reentrantly.

use std::cell::RefCell;
use std::rc::Rc;

struct EmitterInner<T> {
    next_slot: u64,
    callbacks: Vec<(u64, Rc<dyn Fn(&T)>)>,
}

/// A single-threaded callback list carrying values of type `T`.
pub(crate) struct Emitter<T> {
    inner: Rc<RefCell<EmitterInner<T>>>,
}

impl<T: 'static> Emitter<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(EmitterInner {
                next_slot: 0,
                callbacks: Vec::new(),
            })),
        }
    }

    /// Register a callback, invoked on every emission until the returned
    /// guard is dropped.
    pub(crate) fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let slot = {
            let mut inner = self.inner.borrow_mut();
            let slot = inner.next_slot;
            inner.next_slot += 1;
            inner.callbacks.push((slot, Rc::new(callback)));
            slot
        };

        let weak = Rc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().callbacks.retain(|(id, _)| *id != slot);
                }
            })),
        }
    }

    /// Invoke all currently registered callbacks, in registration order.
    pub(crate) fn emit(&self, value: &T) {
        let snapshot: Vec<Rc<dyn Fn(&T)>> = self
            .inner
            .borrow()
            .callbacks
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        for callback in snapshot {
            callback(value);
        }
    }

    /// Type-erased subscribe handle, collected by deriving frames so a
    /// derived cell can re-subscribe to dependencies of any value type.
    pub(crate) fn hook(&self) -> NotifyHook {
        let emitter = self.clone();
        NotifyHook(Rc::new(move |callback| {
            emitter.subscribe(move |_| callback())
        }))
    }
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Type-erased handle onto an [`Emitter`]'s subscribe entry point.
#[derive(Clone)]
pub(crate) struct NotifyHook(Rc<dyn Fn(Rc<dyn Fn()>) -> Subscription>);

impl NotifyHook {
    pub(crate) fn subscribe(&self, callback: Rc<dyn Fn()>) -> Subscription {
        (self.0)(callback)
    }
}

/// RAII guard for an [`Emitter`] subscription; unsubscribes on drop.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
