//! Store manager: the batching and notification engine.
//!
//! The manager is the central coordinator between cells and their observers.
//! It owns the one-shot subscription registry, the per-cell subscriber sets,
//! and the three ambient contexts that give the runtime its ordering
//! guarantees:
//!
//! 1. **Tracking**: while a tracking frame is open, every cell read
//!    registers the frame's subscription id as a subscriber of that cell.
//!    Exactly one tracking frame may be open at a time.
//!
//! 2. **Updating**: a batch accumulates every subscription resolved by the
//!    writes it contains, plus the will-notify emissions those writes armed.
//!    Batches never nest; re-entering runs the body inline in the open
//!    batch. Before anything is dispatched the batch settles to a fixpoint:
//!    armed will-notify emissions are fired (re-deriving derived cells),
//!    which may arm further cells or resolve further subscriptions, until
//!    nothing new appears. A single pass would miss observers registered by
//!    the emissions themselves and dispatch stale values.
//!
//! 3. **Notifying**: the dispatch pass. Accumulated subscriptions fire
//!    exactly once, in accumulation order, under a notifying frame carrying
//!    the batch's config override. Notifying frames form a stack because a
//!    callback may open (and dispatch) a fresh batch of its own.
//!
//! A write outside any batch behaves as a batch of size one: the will-notify
//! emission fires, then the resolved subscribers run inline, with no
//! notifying frame pushed.
//!
//! All state is thread-local; cells are `!Send`, so a runtime never crosses
//! threads and each thread gets an isolated manager.

use std::cell::RefCell;

use indexmap::{IndexMap, IndexSet};
use tracing::{trace, trace_span};

use crate::selector::PartialSelectorConfigs;

use super::id::{CellId, SubscriptionId};

/// Settle passes allowed per batch before the runtime declares the
/// dependency graph divergent and aborts.
const MAX_SETTLE_PASSES: usize = 1024;

/// A one-shot callback awaiting the next change to a tracked cell.
///
/// Removed from the registry when it fires; the observer re-registers by
/// tracking again.
struct StoreSubscription {
    id: SubscriptionId,
    callback: Box<dyn FnOnce()>,
}

struct TrackingFrame {
    subscription_id: SubscriptionId,
}

struct UpdatingFrame {
    configs: PartialSelectorConfigs,
    /// Subscriptions resolved so far, in accumulation order.
    subscriptions: Vec<StoreSubscription>,
    /// Armed will-notify emissions, drained by the settle loop.
    pending_notify: Vec<Box<dyn FnOnce()>>,
}

struct NotifyingFrame {
    configs: PartialSelectorConfigs,
    /// The subscription currently being dispatched, for diagnostics.
    subscription_id: Option<SubscriptionId>,
}

#[derive(Default)]
struct StoreManager {
    subscriptions: IndexMap<SubscriptionId, StoreSubscription>,
    cell_subscribers: IndexMap<CellId, IndexSet<SubscriptionId>>,
    tracking: Option<TrackingFrame>,
    updating: Option<UpdatingFrame>,
    notifying: Vec<NotifyingFrame>,
}

thread_local! {
    static MANAGER: RefCell<StoreManager> = RefCell::new(StoreManager::default());
}

/// Borrow the manager briefly. Callbacks are never invoked while the borrow
/// is held; every dispatch site extracts what it needs first.
fn with_manager<R>(f: impl FnOnce(&mut StoreManager) -> R) -> R {
    MANAGER.with(|manager| f(&mut manager.borrow_mut()))
}

// ----------------------------------------------------------------------------
// Tracking
// ----------------------------------------------------------------------------

/// The subscription id of the open tracking frame, if any.
pub(crate) fn tracking_id() -> Option<SubscriptionId> {
    with_manager(|m| m.tracking.as_ref().map(|t| t.subscription_id))
}

/// Run `apply` inside a fresh tracking frame; every cell read during it
/// subscribes `on_notify` to that cell's next change.
///
/// Returns the result together with the subscription id, which the caller
/// stores so it can expire the subscription on teardown.
///
/// # Panics
///
/// Panics if a tracking frame is already open. Tracked reads do not nest;
/// derived cells nest through the deriving context instead.
pub(crate) fn with_tracking<T>(
    apply: impl FnOnce() -> T,
    on_notify: impl FnOnce() + 'static,
) -> (T, SubscriptionId) {
    let id = SubscriptionId::next();
    with_manager(|m| {
        if m.tracking.is_some() {
            panic!("a tracking context is already open on this thread");
        }
        m.tracking = Some(TrackingFrame {
            subscription_id: id,
        });
    });

    let span = trace_span!("tracking", ?id).entered();
    let value = apply();
    drop(span);

    with_manager(|m| {
        m.tracking = None;
        m.subscriptions.insert(
            id,
            StoreSubscription {
                id,
                callback: Box::new(on_notify),
            },
        );
    });
    (value, id)
}

/// Drop a registered subscription without firing it. Unknown ids are
/// ignored.
pub(crate) fn expire(id: SubscriptionId) {
    with_manager(|m| {
        m.subscriptions.swap_remove(&id);
    });
}

// ----------------------------------------------------------------------------
// Cell subscribers
// ----------------------------------------------------------------------------

/// Register `subscription_id` as waiting on the next change of `cell_id`.
/// Idempotent within one tracking pass.
pub(crate) fn register_cell_subscriber(cell_id: CellId, subscription_id: SubscriptionId) {
    with_manager(|m| {
        m.cell_subscribers
            .entry(cell_id)
            .or_default()
            .insert(subscription_id);
    });
}

/// Remove and return all subscription ids waiting on `cell_id`.
pub(crate) fn take_cell_subscribers(cell_id: CellId) -> Option<IndexSet<SubscriptionId>> {
    with_manager(|m| m.cell_subscribers.swap_remove(&cell_id))
}

// ----------------------------------------------------------------------------
// Notification
// ----------------------------------------------------------------------------

/// Resolve the given subscription ids and hand them to the dispatch
/// machinery: appended to the open batch, or invoked inline when no batch is
/// open. Ids no longer in the registry are dropped silently.
pub(crate) fn notify(subscription_ids: impl IntoIterator<Item = SubscriptionId>) {
    let immediate = with_manager(|m| {
        let active: Vec<StoreSubscription> = subscription_ids
            .into_iter()
            .filter_map(|id| {
                let subscription = m.subscriptions.swap_remove(&id);
                if subscription.is_none() {
                    trace!(?id, "skipping expired subscription");
                }
                subscription
            })
            .collect();

        match m.updating.as_mut() {
            Some(frame) => {
                trace!(count = active.len(), "appending to open batch");
                frame.subscriptions.extend(active);
                None
            }
            None => Some(active),
        }
    });

    if let Some(subscriptions) = immediate {
        for subscription in subscriptions {
            trace!(id = ?subscription.id, "notifying");
            (subscription.callback)();
        }
    }
}

/// Queue a will-notify emission for the settle phase of the open batch.
///
/// Returns the emission back to the caller when no batch is open, in which
/// case it must fire immediately (write as a batch of size one).
pub(crate) fn arm_will_notify(fire: Box<dyn FnOnce()>) -> Option<Box<dyn FnOnce()>> {
    with_manager(|m| match m.updating.as_mut() {
        Some(frame) => {
            frame.pending_notify.push(fire);
            None
        }
        None => Some(fire),
    })
}

/// The config override of the innermost notifying frame, if a dispatch pass
/// is running.
pub(crate) fn notifying_configs() -> Option<PartialSelectorConfigs> {
    with_manager(|m| m.notifying.last().map(|frame| frame.configs))
}

/// The subscription currently being dispatched, if any.
pub(crate) fn notifying_id() -> Option<SubscriptionId> {
    with_manager(|m| m.notifying.last().and_then(|frame| frame.subscription_id))
}

// ----------------------------------------------------------------------------
// Batching
// ----------------------------------------------------------------------------

/// Group writes into one settle/notify pass.
///
/// Re-entrant calls run the body inline in the already-open batch.
pub fn batch(body: impl FnOnce()) {
    batch_with(PartialSelectorConfigs::default(), body);
}

/// [`batch`] with a config override carried into the notify pass, where it
/// takes precedence over per-projection and per-selector configuration.
pub fn batch_with(configs: PartialSelectorConfigs, body: impl FnOnce()) {
    let reentered = with_manager(|m| {
        if m.updating.is_some() {
            true
        } else {
            m.updating = Some(UpdatingFrame {
                configs,
                subscriptions: Vec::new(),
                pending_notify: Vec::new(),
            });
            false
        }
    });

    if reentered {
        trace!("re-entering open batch");
        body();
        return;
    }

    let span = trace_span!("batch").entered();
    body();
    settle();
    let frame = with_manager(|m| m.updating.take()).expect("batch frame lost during settle");
    drop(span);

    notify_all(frame);
}

/// Fire armed will-notify emissions until none remain.
///
/// An emission may re-derive cells, resolve further subscriptions into the
/// batch, or (through reentrant writes) arm further emissions; the loop runs
/// until the accumulated state stops growing so that no observer is
/// dispatched with a stale value.
fn settle() {
    let mut passes = 0;
    loop {
        let pending = with_manager(|m| {
            let frame = m.updating.as_mut().expect("settle without an open batch");
            std::mem::take(&mut frame.pending_notify)
        });
        if pending.is_empty() {
            break;
        }

        passes += 1;
        if passes > MAX_SETTLE_PASSES {
            panic!(
                "batch failed to settle after {MAX_SETTLE_PASSES} passes; \
                 a will-notify observer keeps dirtying cells"
            );
        }
        trace!(pass = passes, cells = pending.len(), "settle pass");
        for fire in pending {
            fire();
        }
    }
}

/// Dispatch the settled batch under a notifying frame.
fn notify_all(frame: UpdatingFrame) {
    if frame.subscriptions.is_empty() {
        return;
    }
    let _span = trace_span!("notify_all", count = frame.subscriptions.len()).entered();

    with_manager(|m| {
        m.notifying.push(NotifyingFrame {
            configs: frame.configs,
            subscription_id: None,
        })
    });
    for subscription in frame.subscriptions {
        with_manager(|m| {
            if let Some(top) = m.notifying.last_mut() {
                top.subscription_id = Some(subscription.id);
            }
        });
        trace!(id = ?subscription.id, "notifying");
        (subscription.callback)();
    }
    with_manager(|m| {
        m.notifying.pop();
    });
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
