//! Selector subscriptions over form state
//!
//! A subscriber picks a slice out of [`FormState`] with a selector and only
//! hears about transitions that change that slice. After each transition
//! the selector re-runs and the comparer decides whether the new slice
//! equals the previous one; the callback fires only when it does not.
//!
//! This is what keeps one keystroke from re-rendering every field on the
//! form: a field watching `values.email` stays silent while `values.name`
//! changes.

use std::cell::RefCell;

use crate::state::FormState;
use crate::value::FormValue;

/// Equality test between two slices. `true` means "unchanged".
pub type Comparer<S> = Box<dyn Fn(&S, &S) -> bool>;

/// The default comparer: `PartialEq`.
///
/// For [`FormValue`] slices this is deep equality with shared-reference
/// short-circuiting.
pub fn default_comparer<S: PartialEq>() -> Comparer<S> {
    Box::new(|prev: &S, next: &S| prev == next)
}

/// Reference comparer for value slices: containers compare by identity,
/// scalars by value
pub fn identity_comparer() -> Comparer<FormValue> {
    Box::new(|prev: &FormValue, next: &FormValue| prev.ptr_eq(next))
}

/// Per-subscriber memo of the last selected slice
pub(crate) struct SliceWatcher<S> {
    selector: Box<dyn Fn(&FormState) -> S>,
    comparer: Comparer<S>,
    callback: Box<dyn Fn(&S)>,
    last: RefCell<S>,
}

impl<S: 'static> SliceWatcher<S> {
    /// Seed the memo from the state at subscription time
    pub(crate) fn new(
        state: &FormState,
        selector: Box<dyn Fn(&FormState) -> S>,
        comparer: Comparer<S>,
        callback: Box<dyn Fn(&S)>,
    ) -> Self {
        let last = RefCell::new(selector(state));
        Self {
            selector,
            comparer,
            callback,
            last,
        }
    }

    /// Re-run the selector; invoke the callback if the slice changed.
    ///
    /// Returns whether the callback ran.
    pub(crate) fn observe(&self, state: &FormState) -> bool {
        let next = (self.selector)(state);
        let changed = {
            let last = self.last.borrow();
            !(self.comparer)(&last, &next)
        };
        if !changed {
            return false;
        }
        *self.last.borrow_mut() = next;
        // Dispatches made from the callback queue their notification, so
        // nothing re-enters this watcher while the memo is borrowed
        (self.callback)(&self.last.borrow());
        true
    }
}
