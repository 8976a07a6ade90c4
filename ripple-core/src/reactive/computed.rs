//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computeds Work
//!
//! 1. On first access, the computed runs its getter inside its backing
//!    effect and caches the result.
//!
//! 2. When accessed again and nothing it read has changed, the cached value
//!    is returned without running the getter.
//!
//! 3. When a dependency changes, the backing effect's scheduler marks the
//!    computed dirty and notifies whoever reads the computed. It does not
//!    recompute.
//!
//! 4. On next access, a dirty computed recomputes once, no matter how many
//!    writes happened in between.
//!
//! Computeds that are never read after going dirty never recompute.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use super::effect::{computed_effect, run_effect};
use super::runtime::{track_dep, trigger_dep, try_with_runtime, with_runtime, Scheduler};
use super::subscriber::{DepId, EffectId};
use super::Dep;
use crate::error::{ReactiveError, Result};

/// Options accepted by [`Computed::with_options`].
#[derive(Debug, Clone, Copy)]
pub struct ComputedOptions {
    /// Reuse the cached value while clean. When `false`, every read re-runs
    /// the getter.
    pub cacheable: bool,
}

impl Default for ComputedOptions {
    fn default() -> Self {
        Self { cacheable: true }
    }
}

struct ComputedInner<T> {
    dep: DepId,
    effect: EffectId,
    getter: Rc<dyn Fn() -> T>,
    setter: Option<Rc<dyn Fn(T)>>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    cacheable: bool,
}

impl<T> ComputedInner<T> {
    fn mark_dirty(&self) {
        if !self.dirty.get() {
            self.dirty.set(true);
            trigger_dep(self.dep);
        }
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        // The removed state owns the getter; drop it after the borrow ends.
        let stopped = try_with_runtime(|rt| rt.stop(self.effect));
        drop(stopped);
        try_with_runtime(|rt| rt.free_dep(self.dep));
    }
}

/// A cached derived value.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Computed, Signal};
///
/// let count = Signal::new(2);
/// let count_clone = count.clone();
/// let doubled = Computed::new(move || count_clone.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: 'static> Computed<T> {
    /// Create a read-only computed from a getter.
    ///
    /// The getter is not run until the first read.
    pub fn new(getter: impl Fn() -> T + 'static) -> Self {
        Self::build(Rc::new(getter), None, ComputedOptions::default())
    }

    /// Create a writable computed. Writes are forwarded to `setter`.
    pub fn with_setter(getter: impl Fn() -> T + 'static, setter: impl Fn(T) + 'static) -> Self {
        Self::build(Rc::new(getter), Some(Rc::new(setter)), ComputedOptions::default())
    }

    /// Create a read-only computed with options.
    pub fn with_options(getter: impl Fn() -> T + 'static, options: ComputedOptions) -> Self {
        Self::build(Rc::new(getter), None, options)
    }

    fn build(getter: Rc<dyn Fn() -> T>, setter: Option<Rc<dyn Fn(T)>>, options: ComputedOptions) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let scheduler: Scheduler = Rc::new(move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.mark_dirty();
                }
            });
            ComputedInner {
                dep: with_runtime(|rt| rt.alloc_dep()),
                effect: computed_effect(Rc::clone(&getter), scheduler),
                getter,
                setter,
                value: RefCell::new(None),
                dirty: Cell::new(true),
                cacheable: options.cacheable,
            }
        });
        Self { inner }
    }

    /// Bring the cached value up to date and borrow it, tracking the read.
    ///
    /// # Panics
    ///
    /// Panics if the getter reads this computed before it has ever produced
    /// a value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let inner = &self.inner;
        track_dep(inner.dep);

        let stale = inner.dirty.get() || !inner.cacheable || inner.value.borrow().is_none();
        if stale {
            inner.dirty.set(false);
            if let Some(value) = run_effect(inner.effect, &*inner.getter) {
                let _old = inner.value.replace(Some(value));
            }
        }

        let value = inner.value.borrow();
        f(value
            .as_ref()
            .expect("computed read itself before its first value was produced"))
    }

    /// Write through the setter.
    ///
    /// Returns [`ReactiveError::ReadonlyComputed`] and leaves everything
    /// unchanged if the computed has no setter.
    pub fn set(&self, value: T) -> Result<()> {
        match &self.inner.setter {
            Some(setter) => {
                let setter = Rc::clone(setter);
                setter(value);
                Ok(())
            }
            None => {
                tracing::warn!("write operation failed: computed value is readonly");
                Err(ReactiveError::ReadonlyComputed)
            }
        }
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.setter.is_none()
    }

    /// Id of the backing effect.
    pub fn effect_id(&self) -> EffectId {
        self.inner.effect
    }

    /// Number of effects (and computeds) reading this computed.
    pub fn subscriber_count(&self) -> usize {
        with_runtime(|rt| rt.dep(self.inner.dep).map_or(0, Dep::len))
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("effect", &self.inner.effect)
            .field("dirty", &self.inner.dirty.get())
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
