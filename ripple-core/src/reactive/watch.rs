//! Watchers
//!
//! A watcher pairs a getter with a callback. The getter runs inside a lazy
//! effect; when something it read changes, the effect's scheduler re-runs
//! the getter and hands the new and previous results to the callback.
//!
//! Without a queue the callback fires synchronously on every change. With
//! a [`JobQueue`] the re-run waits for the queue's flush, so several writes
//! in between produce one callback.
//!
//! A deep watcher also reads everything nested under the getter's result
//! when it is a [`Value`] or an [`Observable`], so writes anywhere below it
//! fire the callback.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::effect::{effect_with, EffectOptions, EffectRunner};
use super::scheduler::JobQueue;
use crate::observable::{traverse, Observable, Value};

/// Options accepted by [`watch`].
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    /// Fire the callback once at creation, with no previous value.
    pub immediate: bool,
    /// Depend on every nested field of the getter's result and fire the
    /// callback on every notification, even if the result compares equal.
    pub deep: bool,
    /// Defer re-runs to this queue's flush.
    pub queue: Option<JobQueue>,
}

impl WatchOptions {
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn deep(mut self) -> Self {
        self.deep = true;
        self
    }

    pub fn queue(mut self, queue: &JobQueue) -> Self {
        self.queue = Some(queue.clone());
        self
    }
}

/// Handle returned by [`watch`].
pub struct WatchHandle<T> {
    runner: EffectRunner<T>,
}

impl<T: 'static> WatchHandle<T> {
    /// Stop watching. Idempotent.
    pub fn stop(&self) {
        self.runner.stop();
    }

    pub fn is_active(&self) -> bool {
        self.runner.is_active()
    }
}

impl<T> fmt::Debug for WatchHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle").field("runner", &self.runner).finish()
    }
}

/// Call `callback(new, old)` whenever the result of `getter` changes.
///
/// `old` is `None` only for the immediate call.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use ripple_core::reactive::{watch, Signal, WatchOptions};
///
/// let count = Signal::new(1);
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let (count_clone, log_clone) = (count.clone(), log.clone());
/// let handle = watch(
///     move || count_clone.get(),
///     move |new, old| log_clone.borrow_mut().push((*new, old.copied())),
///     WatchOptions::default(),
/// );
///
/// count.set(2);
/// assert_eq!(log.borrow().as_slice(), &[(2, Some(1))]);
/// handle.stop();
/// ```
pub fn watch<T, G, C>(getter: G, callback: C, options: WatchOptions) -> WatchHandle<T>
where
    T: PartialEq + 'static,
    G: Fn() -> T + 'static,
    C: Fn(&T, Option<&T>) + 'static,
{
    let WatchOptions {
        immediate,
        deep,
        queue,
    } = options;

    let old: Rc<RefCell<Option<Rc<T>>>> = Rc::new(RefCell::new(None));
    let runner_slot: Rc<RefCell<Option<EffectRunner<T>>>> = Rc::new(RefCell::new(None));

    let job: Rc<dyn Fn()> = {
        let (old, runner_slot) = (Rc::clone(&old), Rc::clone(&runner_slot));
        Rc::new(move || {
            let Some(runner) = runner_slot.borrow().clone() else {
                return;
            };
            if !runner.is_active() {
                return;
            }
            let Some(new_value) = runner.run() else {
                return;
            };
            let changed = deep || old.borrow().as_deref() != Some(&new_value);
            if changed {
                let new_value = Rc::new(new_value);
                // Store before calling out, so a nested run compares against
                // this value.
                let previous = old.replace(Some(Rc::clone(&new_value)));
                callback(&new_value, previous.as_deref());
            }
        })
    };

    let scheduler = {
        let job = Rc::clone(&job);
        move |id| match &queue {
            Some(queue) => {
                let job = Rc::clone(&job);
                queue.queue(id, move || job());
            }
            None => job(),
        }
    };

    let source = move || {
        let value = getter();
        if deep {
            traverse_result(&value);
        }
        value
    };
    let runner = effect_with(source, EffectOptions::default().lazy().scheduler(scheduler));
    *runner_slot.borrow_mut() = Some(runner.clone());

    if immediate {
        job();
    } else if let Some(initial) = runner.run() {
        *old.borrow_mut() = Some(Rc::new(initial));
    }

    WatchHandle { runner }
}

/// Read everything reachable from an observable result.
fn traverse_result<T: 'static>(value: &T) {
    let value: &dyn Any = value;
    if let Some(value) = value.downcast_ref::<Value>() {
        traverse(value);
    } else if let Some(observable) = value.downcast_ref::<Observable>() {
        traverse(&Value::Observable(observable.clone()));
    }
}
