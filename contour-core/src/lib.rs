//! Contour Core
//!
//! This crate provides the reactive store runtime for the Contour
//! vector-graphics editor. It implements:
//!
//! - Reactive primitives (trackable cells, derived cells)
//! - The batching/notification engine with glitch-free fixpoint settling
//! - The selector/projection layer UI fragments observe the store through
//!
//! The graphics domain model, the document/undo log, and the view layer are
//! external collaborators: they only read and write cells and register
//! through the selector layer.
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: cells, dependency tracking, and the batching engine
//! - `selector`: UI-facing observers with coalesced owner notification
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use contour_core::reactive::{Store, Trackable};
//! use contour_core::selector::{flush_deferred, PartialSelectorConfigs, Selector, SelectorConfigs};
//!
//! struct CanvasStore {
//!     zoom: Trackable<u32>,
//! }
//!
//! impl Store for CanvasStore {}
//!
//! let store = CanvasStore { zoom: Trackable::new(100) };
//!
//! // A UI fragment owns a selector and re-renders when it is invalidated.
//! let invalidated = Rc::new(Cell::new(0));
//! let counter = invalidated.clone();
//! let selector = Selector::new(SelectorConfigs::default(), move |_animation| {
//!     counter.set(counter.get() + 1);
//! });
//! selector.setup("canvas", ());
//!
//! let zoom = store.zoom.clone();
//! let percent = selector.projection("percent", PartialSelectorConfigs::default(), move |_props: &()| {
//!     zoom.get()
//! });
//! assert_eq!(percent.get(), 100);
//!
//! store.update(|updater| updater.set(&store.zoom, 150));
//! flush_deferred();
//!
//! assert_eq!(percent.get(), 150);
//! assert_eq!(invalidated.get(), 1);
//! ```

pub mod reactive;
pub mod selector;
