//! Store update entry points.
//!
//! A store is any struct declaring [`Trackable`] and
//! [`Derived`](super::Derived) fields. Reading cells is unrestricted;
//! mutation goes through [`Store::update`], which batches the closure's
//! writes and hands it the only handle able to perform them.

use crate::selector::PartialSelectorConfigs;

use super::manager;
use super::trackable::Trackable;

/// Mutator handed to [`Store::update`] closures; the sole path to cell
/// writes.
pub struct Updater {
    _private: (),
}

impl Updater {
    /// Assign `value` to `cell`. No-op when the value is unchanged.
    pub fn set<T>(&self, cell: &Trackable<T>, value: T)
    where
        T: Clone + PartialEq + 'static,
    {
        cell.write(value, false);
    }

    /// Assign `value` to `cell`, notifying observers even when the value is
    /// unchanged.
    pub fn set_forced<T>(&self, cell: &Trackable<T>, value: T)
    where
        T: Clone + PartialEq + 'static,
    {
        cell.write(value, true);
    }
}

/// Marker trait giving a cell-owning struct its update entry points.
pub trait Store {
    /// Apply a group of writes as one batch.
    fn update(&self, apply: impl FnOnce(&Updater))
    where
        Self: Sized,
    {
        manager::batch(|| apply(&Updater { _private: () }));
    }

    /// [`update`](Store::update) with a config override carried into the
    /// notify pass.
    fn update_with(&self, configs: PartialSelectorConfigs, apply: impl FnOnce(&Updater))
    where
        Self: Sized,
    {
        manager::batch_with(configs, || apply(&Updater { _private: () }));
    }
}
