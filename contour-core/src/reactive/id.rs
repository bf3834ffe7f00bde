//! Identity types for the reactive runtime.
//!
//! Cells and registry subscriptions are referenced by small copyable ids
//! rather than by pointer, so the subscription registry and the deriving
//! context can hold plain sets without keeping cells alive.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identity of a trackable cell.
///
/// Assigned lazily: a cell acquires its id on its first read or first write
/// and keeps it for the rest of its life. Derived cells have no identity of
/// their own; they are known to observers only through the trackable ids
/// they depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(u64);

impl CellId {
    /// Generate the next cell id.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Unique identity of a one-shot subscription in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Generate the next subscription id.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}
