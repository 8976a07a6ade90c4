//! Signal Implementation
//!
//! A Signal is a single observable cell. It owns one dep in the runtime and
//! behaves like a one-field state container:
//!
//! 1. When a signal is read while an effect is tracking, the effect is
//!    subscribed to the signal's dep.
//!
//! 2. When a signal is written with a value that differs from the current
//!    one, every subscriber is notified. Writing an equal value does nothing.
//!
//! Clones share the same cell. The dep is released when the last clone is
//! dropped.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::runtime::{track_dep, trigger_dep, try_with_runtime, with_runtime};
use super::subscriber::DepId;
use super::Dep;

struct SignalInner<T> {
    dep: DepId,
    value: RefCell<T>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        try_with_runtime(|rt| rt.free_dep(self.dep));
    }
}

/// A reactive cell holding a value of type `T`.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// ```
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                dep: with_runtime(|rt| rt.alloc_dep()),
                value: RefCell::new(value),
            }),
        }
    }

    /// Borrow the current value, tracking the read.
    ///
    /// `f` must not write to this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        track_dep(self.inner.dep);
        f(&self.inner.value.borrow())
    }

    /// Replace the value without notifying anyone.
    pub fn set_untracked(&self, value: T) -> T {
        self.inner.value.replace(value)
    }

    /// Notify subscribers even though the value did not change, e.g. after
    /// mutating it in place through [`update_in_place`](Self::update_in_place).
    pub fn trigger(&self) {
        trigger_dep(self.inner.dep);
    }

    /// Mutate the value in place and notify subscribers.
    pub fn update_in_place(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        self.trigger();
    }

    /// Number of effects subscribed to this signal.
    pub fn subscriber_count(&self) -> usize {
        with_runtime(|rt| rt.dep(self.inner.dep).map_or(0, Dep::len))
    }

    /// Whether two handles share the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Get the current value.
    ///
    /// If called within a tracking effect, this also subscribes the effect.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T: PartialEq + 'static> Signal<T> {
    /// Set a new value and notify subscribers if it changed.
    pub fn set(&self, value: T) {
        let changed = *self.inner.value.borrow() != value;
        if changed {
            let _old = self.inner.value.replace(value);
            self.trigger();
        }
    }

    /// Update the value using a function of the current value.
    ///
    /// The read is tracked, like `count.set(count.get() + 1)` would be.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let new_value = self.with(f);
        self.set(new_value);
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("dep", &self.inner.dep)
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
