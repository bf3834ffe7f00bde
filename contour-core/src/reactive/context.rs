//! Deriving context.
//!
//! While a derived cell computes, an ambient deriving frame records every
//! trackable id read (transitively, through other derived cells) together
//! with the will-notify hooks needed to re-subscribe to them. Dependencies
//! are discovered dynamically on every computation: conditional reads change
//! the recorded set, so the frame is rebuilt from scratch each time.
//!
//! Frames form a thread-local stack so that a chain of never-computed
//! derived cells can be evaluated lazily: the inner derivation records into
//! its own frame, and its result set is then folded into the enclosing frame
//! when the inner cell is read.

use std::cell::RefCell;

use indexmap::IndexSet;
use smallvec::SmallVec;
use tracing::trace;

use super::emitter::NotifyHook;
use super::id::CellId;

thread_local! {
    static DERIVING: RefCell<Vec<DerivingFrame>> = RefCell::new(Vec::new());
}

/// Dependencies recorded during one derivation.
pub(crate) struct DerivingFrame {
    /// Trackable ids read during the derivation.
    pub(crate) cell_ids: IndexSet<CellId>,
    /// Will-notify hooks of the cells behind `cell_ids`, one per distinct
    /// source (a derived dependency contributes a single hook for its whole
    /// id set).
    pub(crate) sources: SmallVec<[NotifyHook; 4]>,
}

/// Run `apply` inside a fresh deriving frame and return the recorded
/// dependencies alongside its result.
pub(crate) fn with_deriving<T>(apply: impl FnOnce() -> T) -> (T, DerivingFrame) {
    DERIVING.with(|stack| {
        stack.borrow_mut().push(DerivingFrame {
            cell_ids: IndexSet::new(),
            sources: SmallVec::new(),
        })
    });

    let value = apply();

    let frame = DERIVING
        .with(|stack| stack.borrow_mut().pop())
        .expect("deriving stack underflow");
    trace!(deps = frame.cell_ids.len(), "derivation recorded");
    (value, frame)
}

/// Record a trackable read into the innermost frame, if one is active.
///
/// Idempotent per frame: the hook is materialized only when the id is new.
pub(crate) fn record(id: CellId, hook: impl FnOnce() -> NotifyHook) {
    DERIVING.with(|stack| {
        if let Some(frame) = stack.borrow_mut().last_mut() {
            if frame.cell_ids.insert(id) {
                frame.sources.push(hook());
            }
        }
    });
}

/// Record a derived read into the innermost frame, if one is active.
///
/// The derived cell's whole dependency set is folded in, linking the
/// enclosing derivation to the ultimate trackables rather than to the
/// intermediate cell. Skipped entirely when the frame already covers the
/// set.
pub(crate) fn record_transitive(ids: &IndexSet<CellId>, hook: impl FnOnce() -> NotifyHook) {
    DERIVING.with(|stack| {
        if let Some(frame) = stack.borrow_mut().last_mut() {
            if !ids.iter().all(|id| frame.cell_ids.contains(id)) {
                for id in ids {
                    frame.cell_ids.insert(*id);
                }
                frame.sources.push(hook());
            }
        }
    });
}
