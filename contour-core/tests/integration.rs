//! Integration tests for the reactive store runtime.
//!
//! These tests exercise cells, the batching engine, and the selector layer
//! together, the way a store and its observing UI fragments use them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use contour_core::reactive::{batch_with, Derived, Store, Trackable};
use contour_core::selector::{
    flush_deferred, pending_deferred, AnimationPreset, PartialSelectorConfigs, Selector,
    SelectorConfigs,
};

struct CounterStore {
    count: Trackable<i64>,
}

impl Store for CounterStore {}

fn counting_selector() -> (Selector<()>, Rc<Cell<usize>>) {
    let notifications = Rc::new(Cell::new(0));
    let counter = notifications.clone();
    let selector = Selector::new(SelectorConfigs::default(), move |_| {
        counter.set(counter.get() + 1);
    });
    selector.setup("fragment", ());
    (selector, notifications)
}

/// The canonical scenario: `count` starts at 0, a batch writes 1, and a
/// `doubled` projection tracked beforehand reports 2 with exactly one owner
/// notification.
#[test]
fn batched_write_updates_projection_once() {
    let store = CounterStore {
        count: Trackable::new(0),
    };
    let (selector, notifications) = counting_selector();

    let count = store.count.clone();
    let doubled = selector.projection("doubled", PartialSelectorConfigs::default(), move |_: &()| {
        count.get() * 2
    });
    assert_eq!(doubled.get(), 0);

    store.update(|up| up.set(&store.count, 1));

    assert_eq!(notifications.get(), 0);
    assert_eq!(flush_deferred(), 1);
    assert_eq!(notifications.get(), 1);
    assert_eq!(doubled.get(), 2);
}

/// Two cells read by one projection, both written in one batch: the owner is
/// invalidated exactly once.
#[test]
fn one_projection_reading_two_cells_coalesces() {
    struct PairStore {
        a: Trackable<i64>,
        b: Trackable<i64>,
    }
    impl Store for PairStore {}

    let store = PairStore {
        a: Trackable::new(1),
        b: Trackable::new(2),
    };
    let (selector, notifications) = counting_selector();

    let (a, b) = (store.a.clone(), store.b.clone());
    let sum = selector.projection("sum", PartialSelectorConfigs::default(), move |_: &()| {
        a.get() + b.get()
    });
    assert_eq!(sum.get(), 3);

    store.update(|up| {
        up.set(&store.a, 10);
        up.set(&store.b, 20);
    });
    flush_deferred();

    assert_eq!(sum.get(), 30);
    assert_eq!(notifications.get(), 1);
}

/// Two projections of the same selector changed in one batch coalesce into a
/// single owner invalidation.
#[test]
fn sibling_projections_coalesce_per_selector() {
    struct PairStore {
        a: Trackable<i64>,
        b: Trackable<i64>,
    }
    impl Store for PairStore {}

    let store = PairStore {
        a: Trackable::new(1),
        b: Trackable::new(2),
    };
    let (selector, notifications) = counting_selector();

    let a = store.a.clone();
    let left = selector.projection("left", PartialSelectorConfigs::default(), move |_: &()| a.get());
    let b = store.b.clone();
    let right = selector.projection("right", PartialSelectorConfigs::default(), move |_: &()| b.get());
    assert_eq!(left.get(), 1);
    assert_eq!(right.get(), 2);

    store.update(|up| {
        up.set(&store.a, 5);
        up.set(&store.b, 6);
    });
    flush_deferred();

    assert_eq!(left.get(), 5);
    assert_eq!(right.get(), 6);
    assert_eq!(notifications.get(), 1);
}

/// A projection whose re-evaluated value is unchanged does not notify.
#[test]
fn unchanged_projection_value_stays_silent() {
    let store = CounterStore {
        count: Trackable::new(4),
    };
    let (selector, notifications) = counting_selector();

    let count = store.count.clone();
    let positive = selector.projection("positive", PartialSelectorConfigs::default(), move |_: &()| {
        count.get() > 0
    });
    assert!(positive.get());

    // The cell changes, the projected value does not.
    store.update(|up| up.set(&store.count, 9));
    flush_deferred();

    assert_eq!(notifications.get(), 0);
    assert!(positive.get());
}

/// `always_notify` overrides the equality check.
#[test]
fn always_notify_fires_on_unchanged_value() {
    let store = CounterStore {
        count: Trackable::new(4),
    };
    let (selector, notifications) = counting_selector();

    let count = store.count.clone();
    let positive = selector.projection("positive", PartialSelectorConfigs::always(), move |_: &()| {
        count.get() > 0
    });
    assert!(positive.get());

    store.update(|up| up.set(&store.count, 9));
    flush_deferred();

    assert_eq!(notifications.get(), 1);
}

/// `sync_notify` bypasses the deferred queue.
#[test]
fn sync_notify_invalidates_inline() {
    let store = CounterStore {
        count: Trackable::new(0),
    };
    let (selector, notifications) = counting_selector();

    let count = store.count.clone();
    let value = selector.projection("value", PartialSelectorConfigs::sync(), move |_: &()| {
        count.get()
    });
    assert_eq!(value.get(), 0);

    store.update(|up| up.set(&store.count, 1));

    assert_eq!(notifications.get(), 1);
    assert_eq!(pending_deferred(), 0);
}

/// A per-batch config override takes precedence over projection and selector
/// configuration.
#[test]
fn batch_override_forces_sync_delivery() {
    let store = CounterStore {
        count: Trackable::new(0),
    };
    let (selector, notifications) = counting_selector();

    let count = store.count.clone();
    let value = selector.projection("value", PartialSelectorConfigs::default(), move |_: &()| {
        count.get()
    });
    assert_eq!(value.get(), 0);

    batch_with(PartialSelectorConfigs::sync(), || {
        store.update(|up| up.set(&store.count, 1));
    });

    assert_eq!(notifications.get(), 1);
    assert_eq!(pending_deferred(), 0);
}

/// The animation configured on a projection reaches the owner callback.
#[test]
fn animation_reaches_owner_callback() {
    let store = CounterStore {
        count: Trackable::new(0),
    };

    let seen: Rc<Cell<Option<AnimationPreset>>> = Rc::new(Cell::new(None));
    let seen_clone = seen.clone();
    let selector = Selector::new(SelectorConfigs::default(), move |animation| {
        seen_clone.set(animation);
    });
    selector.setup("fragment", ());

    let count = store.count.clone();
    let value = selector.projection(
        "value",
        PartialSelectorConfigs::animated(AnimationPreset::Gentle),
        move |_: &()| count.get(),
    );
    assert_eq!(value.get(), 0);

    store.update(|up| up.set(&store.count, 1));
    flush_deferred();

    assert_eq!(seen.get(), Some(AnimationPreset::Gentle));
}

/// A projection over a derived cell is invalidated through the cell's
/// ultimate trackables, with the fully settled value.
#[test]
fn projection_over_derived_sees_settled_value() {
    let store = CounterStore {
        count: Trackable::new(2),
    };
    let count = store.count.clone();
    let squared = Derived::new(move || {
        let v = count.get();
        v * v
    });

    let (selector, notifications) = counting_selector();
    let squared_clone = squared.clone();
    let value = selector.projection("squared", PartialSelectorConfigs::default(), move |_: &()| {
        squared_clone.get()
    });
    assert_eq!(value.get(), 4);

    store.update(|up| up.set(&store.count, 3));
    flush_deferred();

    assert_eq!(value.get(), 9);
    assert_eq!(notifications.get(), 1);
}

/// Within one batch an observer is only ever dispatched with the final value
/// of every cell it reads, never a mid-batch combination.
#[test]
fn observers_never_see_intermediate_values() {
    struct PairStore {
        a: Trackable<i64>,
        b: Trackable<i64>,
    }
    impl Store for PairStore {}

    let store = PairStore {
        a: Trackable::new(0),
        b: Trackable::new(0),
    };
    let a = store.a.clone();
    let doubled = Derived::new(move || a.get() * 2);

    let observed = Rc::new(RefCell::new(Vec::new()));
    let selector: Selector<()> = Selector::new(SelectorConfigs::default(), |_| {});
    selector.setup("fragment", ());

    let (a, b, d) = (store.a.clone(), store.b.clone(), doubled.clone());
    let observed_clone = observed.clone();
    let snapshot = selector.projection("snapshot", PartialSelectorConfigs::default(), move |_: &()| {
        let tuple = (a.get(), b.get(), d.get());
        observed_clone.borrow_mut().push(tuple);
        tuple
    });
    let _ = snapshot.get();

    for step in 1..=3 {
        store.update(|up| {
            up.set(&store.a, step);
            up.set(&store.a, step * 10);
            up.set(&store.b, step * 100);
        });
        flush_deferred();
    }

    for (a, b, d) in observed.borrow().iter().copied() {
        // Every evaluation saw a consistent, settled world.
        assert_eq!(d, a * 2, "derived out of sync with its source");
        assert!(
            (a, b) == (0, 0) || (b == a * 10),
            "intermediate values leaked into an evaluation: ({a}, {b})"
        );
    }
}

/// A chain of derived cells settles in one batch and ends up reflecting the
/// post-batch value at every level.
#[test]
fn derived_chain_settles_to_fixpoint() {
    const DEPTH: i64 = 16;

    let store = CounterStore {
        count: Trackable::new(0),
    };

    let root = store.count.clone();
    let mut chain = vec![Derived::new(move || root.get() + 1)];
    for _ in 1..DEPTH {
        let prev = chain.last().unwrap().clone();
        chain.push(Derived::new(move || prev.get() + 1));
    }
    assert_eq!(chain.last().unwrap().get(), DEPTH);

    let (selector, notifications) = counting_selector();
    let tail = chain.last().unwrap().clone();
    let deepest = selector.projection("deepest", PartialSelectorConfigs::default(), move |_: &()| {
        tail.get()
    });
    assert_eq!(deepest.get(), DEPTH);

    store.update(|up| up.set(&store.count, 100));
    flush_deferred();

    assert_eq!(deepest.get(), 100 + DEPTH);
    assert_eq!(notifications.get(), 1);
    for (i, derived) in chain.iter().enumerate() {
        assert_eq!(derived.get(), 100 + i as i64 + 1);
    }
}

/// Re-keying a selector re-tracks its projections against the new props;
/// re-keying with equal props does nothing.
#[test]
fn rekeying_retracks_and_equal_props_are_inert() {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Props {
        slot: usize,
    }

    struct SlotStore {
        first: Trackable<&'static str>,
        second: Trackable<&'static str>,
    }
    impl Store for SlotStore {}

    let store = SlotStore {
        first: Trackable::new("alpha"),
        second: Trackable::new("beta"),
    };

    let notifications = Rc::new(Cell::new(0));
    let counter = notifications.clone();
    let selector = Selector::new(SelectorConfigs::default(), move |_| {
        counter.set(counter.get() + 1);
    });
    selector.setup("slot-view", Props { slot: 0 });

    let (first, second) = (store.first.clone(), store.second.clone());
    let name = selector.projection("name", PartialSelectorConfigs::default(), move |props: &Props| {
        if props.slot == 0 {
            first.get()
        } else {
            second.get()
        }
    });
    assert_eq!(name.get(), "alpha");

    // Same props: caches untouched, no notification, no re-track churn.
    selector.update(Props { slot: 0 });
    flush_deferred();
    assert_eq!(name.get(), "alpha");
    assert_eq!(notifications.get(), 0);

    // New props: re-tracked against the other cell, owner notified.
    selector.update(Props { slot: 1 });
    flush_deferred();
    assert_eq!(name.get(), "beta");
    assert_eq!(notifications.get(), 1);

    // The re-track switched the observed cell as well.
    store.update(|up| up.set(&store.first, "gamma"));
    flush_deferred();
    assert_eq!(notifications.get(), 1);

    store.update(|up| up.set(&store.second, "delta"));
    flush_deferred();
    assert_eq!(name.get(), "delta");
    assert_eq!(notifications.get(), 2);
}

/// Dropping a fragment's selector and projections cancels everything in
/// flight: later writes and flushes neither notify nor panic.
#[test]
fn teardown_cancels_subscriptions_and_deferred_notifications() {
    let store = CounterStore {
        count: Trackable::new(0),
    };
    let (selector, notifications) = counting_selector();

    let count = store.count.clone();
    let value = selector.projection("value", PartialSelectorConfigs::default(), move |_: &()| {
        count.get()
    });
    assert_eq!(value.get(), 0);

    // A change is queued but the fragment is torn down before the tick.
    store.update(|up| up.set(&store.count, 1));
    assert_eq!(pending_deferred(), 1);
    drop(value);
    drop(selector);

    assert_eq!(flush_deferred(), 0);
    store.update(|up| up.set(&store.count, 2));
    assert_eq!(flush_deferred(), 0);
    assert_eq!(notifications.get(), 0);
}

/// A write performed inside an owner callback opens a fresh batch and flows
/// through the runtime normally.
#[test]
fn owner_callback_may_write_back_into_a_store() {
    struct EchoStore {
        input: Trackable<i64>,
        echo: Trackable<i64>,
    }
    impl Store for EchoStore {}

    let store = Rc::new(EchoStore {
        input: Trackable::new(0),
        echo: Trackable::new(0),
    });

    // First fragment: mirrors `input` into `echo` from its invalidation
    // callback, synchronously.
    let mirror_store = store.clone();
    let mirror = Selector::new(SelectorConfigs::default(), move |_| {
        let value = mirror_store.input.get_untracked();
        mirror_store.update(|up| up.set(&mirror_store.echo, value));
    });
    mirror.setup("mirror", ());
    let input = store.input.clone();
    let mirrored = mirror.projection("input", PartialSelectorConfigs::sync(), move |_: &()| {
        input.get()
    });
    assert_eq!(mirrored.get(), 0);

    // Second fragment: observes `echo`.
    let (observer, notifications) = counting_selector();
    let echo = store.echo.clone();
    let echoed = observer.projection("echo", PartialSelectorConfigs::default(), move |_: &()| {
        echo.get()
    });
    assert_eq!(echoed.get(), 0);

    store.update(|up| up.set(&store.input, 7));
    flush_deferred();

    assert_eq!(echoed.get(), 7);
    assert_eq!(notifications.get(), 1);
}

/// The will-notify stream of every touched cell fires before any observer
/// callback runs.
#[test]
fn will_notify_precedes_owner_dispatch() {
    let store = CounterStore {
        count: Trackable::new(0),
    };
    let log = Rc::new(RefCell::new(Vec::new()));

    let log_clone = log.clone();
    let _stream = store
        .count
        .subscribe_will_notify(move |v| log_clone.borrow_mut().push(format!("will-notify {v}")));

    let log_clone = log.clone();
    let selector = Selector::new(SelectorConfigs::default(), move |_| {
        log_clone.borrow_mut().push("owner".to_string());
    });
    selector.setup("fragment", ());
    let count = store.count.clone();
    let value = selector.projection("value", PartialSelectorConfigs::sync(), move |_: &()| {
        count.get()
    });
    assert_eq!(value.get(), 0);

    store.update(|up| up.set(&store.count, 3));

    assert_eq!(
        *log.borrow(),
        vec!["will-notify 3".to_string(), "owner".to_string()]
    );
}
