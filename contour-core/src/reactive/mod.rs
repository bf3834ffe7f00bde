//! Reactive Primitives
//!
//! This module implements the core reactive system: trackable cells, derived
//! cells, and the batching/notification engine they report into.
//!
//! # Concepts
//!
//! ## Trackables
//!
//! A [`Trackable`] is a container for mutable, equatable state. When its
//! value is read within a tracking context, the cell automatically registers
//! that context as a one-shot subscriber of its next change. Writes that
//! change the value resolve those subscribers into the batching engine.
//!
//! ## Deriveds
//!
//! A [`Derived`] is a computed value that caches its result and re-derives
//! whenever one of its dependencies changes. Dependencies are discovered
//! dynamically on every computation, so conditional reads reshape the graph.
//!
//! ## Batches
//!
//! [`batch`] groups writes, possibly across several stores, into one
//! glitch-free settle/notify pass: will-notify emissions fire to a fixpoint
//! (re-deriving derived cells) before any accumulated subscriber runs, so no
//! observer ever sees a mid-batch value.
//!
//! # Implementation Notes
//!
//! The runtime uses thread-local ambient contexts to detect dependencies:
//! when a cell is read, it checks for an active tracking or deriving frame
//! and registers accordingly. This approach ("automatic dependency
//! tracking") is the one used by SolidJS, Vue 3, and Leptos. All state is
//! single-threaded by construction; cells are `!Send`.

pub(crate) mod context;
mod derived;
pub(crate) mod emitter;
pub(crate) mod id;
pub(crate) mod manager;
mod store;
pub(crate) mod trackable;

pub use derived::Derived;
pub use emitter::Subscription;
pub use id::{CellId, SubscriptionId};
pub use manager::{batch, batch_with};
pub use store::{Store, Updater};
pub use trackable::Trackable;
