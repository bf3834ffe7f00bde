//! Selector layer.
//!
//! The UI-facing side of the runtime. A fragment owns a [`Selector`] keyed
//! by equatable props and reads store state through named [`Projection`]s;
//! the runtime invalidates the fragment exactly when an observed value
//! changes, honoring per-projection and per-batch notification
//! configuration.
//!
//! # Concepts
//!
//! ## Selectors
//!
//! A selector carries the props identifying which instance of data its
//! fragment targets, plus the owner-invalidation callback. Re-keying it with
//! new props re-tracks every projection.
//!
//! ## Projections
//!
//! A projection is a memoized read: a pure function of the props and the
//! cells it touches. After every invalidation it is tracked again, so its
//! cache is stale only between a cell change and the re-track.
//!
//! ## Deferred delivery
//!
//! Owner invalidations are coalesced per selector and delivered when the
//! host event loop calls [`flush_deferred`], unless `sync_notify` resolves
//! true for the change.

mod config;
mod projection;
mod scheduler;
mod selector;

pub use config::{AnimationPreset, PartialSelectorConfigs, SelectorConfigs};
pub use projection::Projection;
pub use scheduler::{flush_deferred, pending_deferred};
pub use selector::Selector;
