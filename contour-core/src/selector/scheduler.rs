//! Deferred notification queue.
//!
//! Owner invalidations that are not configured `sync_notify` are not
//! delivered inline; they are queued here and delivered on the next turn of
//! the host's cooperative event loop, which calls [`flush_deferred`] once
//! per tick. The queue holds at most one entry per selector: scheduling
//! replaces (cancels) any earlier entry for the same owner, coalescing every
//! projection change a selector observes within one tick into a single
//! invalidation.
//!
//! Ordering between different selectors is unspecified beyond "each fires at
//! most once per settled batch it observed".

use std::cell::RefCell;

use indexmap::IndexMap;
use tracing::trace;

use super::selector::SelectorId;

thread_local! {
    static QUEUE: RefCell<IndexMap<SelectorId, Box<dyn FnOnce()>>> = RefCell::new(IndexMap::new());
}

/// Queue `notify` for `owner`, replacing any notification already queued for
/// it.
pub(crate) fn schedule(owner: SelectorId, notify: Box<dyn FnOnce()>) {
    QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        if queue.swap_remove(&owner).is_some() {
            trace!(?owner, "replacing queued notification");
        }
        queue.insert(owner, notify);
    });
}

/// Drop any notification queued for `owner`.
pub(crate) fn cancel(owner: SelectorId) {
    QUEUE.with(|queue| {
        queue.borrow_mut().swap_remove(&owner);
    });
}

/// Deliver queued notifications until the queue is empty, including entries
/// queued by the notifications themselves. Returns the number delivered.
///
/// The host event loop calls this once per cooperative tick.
pub fn flush_deferred() -> usize {
    let mut delivered = 0;
    loop {
        let next = QUEUE.with(|queue| queue.borrow_mut().shift_remove_index(0));
        match next {
            Some((owner, notify)) => {
                trace!(?owner, "deferred notify");
                notify();
                delivered += 1;
            }
            None => break,
        }
    }
    delivered
}

/// Number of notifications currently queued.
pub fn pending_deferred() -> usize {
    QUEUE.with(|queue| queue.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn schedule_and_flush() {
        let owner = SelectorId::next();
        let delivered = Rc::new(Cell::new(0));

        let delivered_clone = delivered.clone();
        schedule(
            owner,
            Box::new(move || delivered_clone.set(delivered_clone.get() + 1)),
        );
        assert_eq!(pending_deferred(), 1);

        assert_eq!(flush_deferred(), 1);
        assert_eq!(delivered.get(), 1);
        assert_eq!(pending_deferred(), 0);
    }

    #[test]
    fn rescheduling_replaces_earlier_entry() {
        let owner = SelectorId::next();
        let delivered = Rc::new(Cell::new(0));

        for _ in 0..3 {
            let delivered_clone = delivered.clone();
            schedule(
                owner,
                Box::new(move || delivered_clone.set(delivered_clone.get() + 1)),
            );
        }

        assert_eq!(flush_deferred(), 1);
        assert_eq!(delivered.get(), 1);
    }

    #[test]
    fn cancel_drops_queued_entry() {
        let owner = SelectorId::next();
        let delivered = Rc::new(Cell::new(0));

        let delivered_clone = delivered.clone();
        schedule(
            owner,
            Box::new(move || delivered_clone.set(delivered_clone.get() + 1)),
        );
        cancel(owner);

        assert_eq!(flush_deferred(), 0);
        assert_eq!(delivered.get(), 0);
    }

    #[test]
    fn distinct_owners_each_fire() {
        let delivered = Rc::new(Cell::new(0));
        for _ in 0..2 {
            let owner = SelectorId::next();
            let delivered_clone = delivered.clone();
            schedule(
                owner,
                Box::new(move || delivered_clone.set(delivered_clone.get() + 1)),
            );
        }

        assert_eq!(flush_deferred(), 2);
        assert_eq!(delivered.get(), 2);
    }
}
