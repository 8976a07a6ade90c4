//! Effect Implementation
//!
//! An Effect is a re-runnable computation that tracks its own dependencies
//! on every run and is re-invoked when any of them change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately (unless lazy)
//!    to establish initial dependencies.
//!
//! 2. When any dependency changes, the effect re-runs, or its scheduler is
//!    called instead if it has one.
//!
//! 3. Each run diffs the deps it reads against the deps it read last time
//!    using the generation markers on [`Dep`](super::Dep), so an unchanged
//!    dependency set costs no dep mutation at all, and deps that dropped out
//!    (a branch no longer taken) are unsubscribed.
//!
//! # Reentrancy
//!
//! A run is aborted if the same effect is already on the active chain, and a
//! trigger skips the effect that is currently running unless it opted into
//! `allow_recurse`. Together these keep an effect that writes state it also
//! reads from looping forever.
//!
//! # Stopping
//!
//! [`EffectRunner::stop`] unsubscribes the effect from every dep and frees
//! its arena slot. Stopping an effect from inside its own run is deferred
//! until the run completes. A stopped runner can still be `run()`: the
//! function is called with tracking disabled.

use std::fmt;
use std::rc::Rc;

use super::context::{untracked, ReactiveContext};
use super::operations::DebuggerEvent;
use super::runtime::{with_runtime, DebugHook, EffectState, RunStart, Scheduler, StopHook};
use super::EffectId;

/// Options accepted by [`effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Skip the initial run. `false` means run immediately.
    pub lazy: bool,
    /// Called instead of re-running the effect when a dependency changes.
    pub scheduler: Option<Scheduler>,
    /// Allow a trigger fired while the effect is running to re-invoke it.
    pub allow_recurse: bool,
    /// Called once when the effect stops.
    pub on_stop: Option<StopHook>,
    /// Called when the effect subscribes to a new dep.
    pub on_track: Option<DebugHook>,
    /// Called when a write is about to re-invoke the effect.
    pub on_trigger: Option<DebugHook>,
}

impl EffectOptions {
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn scheduler(mut self, scheduler: impl Fn(EffectId) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn allow_recurse(mut self) -> Self {
        self.allow_recurse = true;
        self
    }

    pub fn on_stop(mut self, on_stop: impl Fn() + 'static) -> Self {
        self.on_stop = Some(Rc::new(on_stop));
        self
    }

    pub fn on_track(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_track = Some(Rc::new(hook));
        self
    }

    pub fn on_trigger(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_trigger = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("allow_recurse", &self.allow_recurse)
            .field("on_stop", &self.on_stop.is_some())
            .field("on_track", &self.on_track.is_some())
            .field("on_trigger", &self.on_trigger.is_some())
            .finish()
    }
}

/// Handle to an effect: re-run it manually or stop it.
///
/// Dropping the runner does not stop the effect; it stays subscribed until
/// [`stop`](Self::stop) is called.
pub struct EffectRunner<T> {
    id: EffectId,
    f: Rc<dyn Fn() -> T>,
}

impl<T: 'static> EffectRunner<T> {
    /// Run the effect now, re-collecting its dependencies.
    ///
    /// Returns `None` if the run was aborted because the effect is already
    /// running further up the call stack.
    pub fn run(&self) -> Option<T> {
        run_effect(self.id, &*self.f)
    }

    /// Stop the effect. Idempotent.
    pub fn stop(&self) {
        stop_effect(self.id);
    }

    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Whether the effect has not been stopped.
    pub fn is_active(&self) -> bool {
        self.id.is_live()
    }

    /// Number of deps the effect currently belongs to.
    pub fn dependency_count(&self) -> usize {
        with_runtime(|rt| rt.effect(self.id).map_or(0, |state| state.deps.len()))
    }
}

impl<T> Clone for EffectRunner<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            f: Rc::clone(&self.f),
        }
    }
}

impl<T> fmt::Debug for EffectRunner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRunner").field("id", &self.id).finish()
    }
}

/// Create an effect and run it immediately.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use ripple_core::reactive::{effect, Signal};
///
/// let count = Signal::new(1);
/// let seen = Rc::new(Cell::new(0));
///
/// let (count_clone, seen_clone) = (count.clone(), seen.clone());
/// effect(move || seen_clone.set(count_clone.get()));
///
/// count.set(5);
/// assert_eq!(seen.get(), 5);
/// ```
pub fn effect<T, F>(f: F) -> EffectRunner<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    effect_with(f, EffectOptions::default())
}

/// Create an effect with options.
pub fn effect_with<T, F>(f: F, options: EffectOptions) -> EffectRunner<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    let f: Rc<dyn Fn() -> T> = Rc::new(f);
    let lazy = options.lazy;
    let job_fn = Rc::clone(&f);

    let id = with_runtime(|rt| {
        rt.insert_effect(|id| {
            let mut state = EffectState::new(Rc::new(move || {
                run_effect(id, &*job_fn);
            }));
            state.scheduler = options.scheduler;
            state.allow_recurse = options.allow_recurse;
            state.on_stop = options.on_stop;
            state.on_track = options.on_track;
            state.on_trigger = options.on_trigger;
            state
        })
    });

    let runner = EffectRunner { id, f };
    if !lazy {
        runner.run();
    }
    runner
}

/// Create an effect that backs a computed: scheduled only, never run by the
/// dispatcher, and ordered ahead of plain effects in a trigger batch.
pub(crate) fn computed_effect<T: 'static>(getter: Rc<dyn Fn() -> T>, scheduler: Scheduler) -> EffectId {
    with_runtime(|rt| {
        rt.insert_effect(|id| {
            let mut state = EffectState::new(Rc::new(move || {
                run_effect(id, &*getter);
            }));
            state.scheduler = Some(scheduler);
            state.computed = true;
            state
        })
    })
}

/// Run protocol shared by runners, computeds, and the dispatcher.
pub(crate) fn run_effect<T>(id: EffectId, f: &dyn Fn() -> T) -> Option<T> {
    match with_runtime(|rt| rt.begin_run(id)) {
        RunStart::Inactive => Some(untracked(f)),
        RunStart::Reentrant => {
            tracing::debug!(effect = ?id, "effect already running, aborting nested run");
            None
        }
        RunStart::Tracking(scope) => {
            let _context = ReactiveContext::enter(scope);
            Some(f())
        }
    }
}

/// Stop an effect, firing its `on_stop` hook outside the runtime borrow.
pub(crate) fn stop_effect(id: EffectId) {
    let Some(state) = with_runtime(|rt| rt.stop(id)) else {
        return;
    };
    if let Some(on_stop) = &state.on_stop {
        on_stop();
    }
    drop(state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    use crate::reactive::{Runtime, Signal};

    fn counter() -> (Rc<Cell<i32>>, Rc<Cell<i32>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn effect_runs_on_creation() {
        let (run_count, run_count_clone) = counter();
        let _runner = effect(move || run_count_clone.set(run_count_clone.get() + 1));
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let (run_count, run_count_clone) = counter();
        let runner = effect_with(
            move || run_count_clone.set(run_count_clone.get() + 1),
            EffectOptions::default().lazy(),
        );
        assert_eq!(run_count.get(), 0);

        // Manually execute
        runner.run();
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn run_returns_function_value() {
        let signal = Signal::new(21);
        let signal_clone = signal.clone();
        let runner = effect(move || signal_clone.get() * 2);
        assert_eq!(runner.run(), Some(42));
    }

    #[test]
    fn effect_reruns_on_dependency_change() {
        let signal = Signal::new(0);
        let observed = Rc::new(Cell::new(-1));

        let (signal_clone, observed_clone) = (signal.clone(), observed.clone());
        let _runner = effect(move || observed_clone.set(signal_clone.get()));
        assert_eq!(observed.get(), 0);

        signal.set(42);
        assert_eq!(observed.get(), 42);
    }

    #[test]
    fn stop_is_idempotent_and_unsubscribes() {
        let signal = Signal::new(0);
        let (run_count, run_count_clone) = counter();
        let stops = Rc::new(Cell::new(0));

        let signal_clone = signal.clone();
        let stops_clone = stops.clone();
        let runner = effect_with(
            move || {
                signal_clone.get();
                run_count_clone.set(run_count_clone.get() + 1);
            },
            EffectOptions::default().on_stop(move || stops_clone.set(stops_clone.get() + 1)),
        );

        runner.stop();
        runner.stop();
        assert_eq!(stops.get(), 1);
        assert!(!runner.is_active());

        signal.set(1);
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn stopped_runner_runs_untracked() {
        let signal = Signal::new(3);
        let signal_clone = signal.clone();
        let runner = effect(move || signal_clone.get());
        runner.stop();

        assert_eq!(runner.run(), Some(3));
        assert_eq!(runner.dependency_count(), 0);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn stop_inside_own_run_is_deferred() {
        let signal = Signal::new(0);
        let handle: Rc<RefCell<Option<EffectRunner<()>>>> = Rc::new(RefCell::new(None));
        let (run_count, run_count_clone) = counter();

        let (signal_clone, handle_clone) = (signal.clone(), handle.clone());
        let runner = effect_with(
            move || {
                signal_clone.get();
                run_count_clone.set(run_count_clone.get() + 1);
                if let Some(me) = handle_clone.borrow().as_ref() {
                    me.stop();
                    // Still running; cleanup waits until the run ends
                    assert!(me.is_active());
                }
            },
            EffectOptions::default(),
        );
        *handle.borrow_mut() = Some(runner.clone());

        signal.set(1);
        assert_eq!(run_count.get(), 2);
        assert!(!runner.is_active());

        signal.set(2);
        assert_eq!(run_count.get(), 2);
        handle.borrow_mut().take();
    }

    #[test]
    fn scheduler_replaces_direct_run() {
        let signal = Signal::new(0);
        let (run_count, run_count_clone) = counter();
        let scheduled = Rc::new(RefCell::new(Vec::new()));

        let (signal_clone, scheduled_clone) = (signal.clone(), scheduled.clone());
        let runner = effect_with(
            move || {
                signal_clone.get();
                run_count_clone.set(run_count_clone.get() + 1);
            },
            EffectOptions::default().scheduler(move |id| scheduled_clone.borrow_mut().push(id)),
        );

        signal.set(1);
        assert_eq!(run_count.get(), 1);
        assert_eq!(scheduled.borrow().as_slice(), &[runner.id()]);

        // The scheduler decides when it actually runs
        assert!(runner.id().run());
        assert_eq!(run_count.get(), 2);
    }

    #[test]
    fn self_mutating_effect_terminates() {
        let signal = Signal::new(0);
        let signal_clone = signal.clone();
        let _runner = effect(move || signal_clone.update(|n| n + 1));
        assert_eq!(signal.get_untracked(), 1);
    }

    #[test]
    fn allow_recurse_lets_effect_retrigger_itself() {
        let build = |allow_recurse: bool| {
            let signal = Signal::new(0);
            let scheduled = Rc::new(Cell::new(0));
            let mut options = EffectOptions::default().scheduler({
                let scheduled = scheduled.clone();
                move |_| scheduled.set(scheduled.get() + 1)
            });
            options.allow_recurse = allow_recurse;

            let signal_clone = signal.clone();
            let runner = effect_with(move || signal_clone.update(|n| n + 1), options);
            runner.stop();
            scheduled.get()
        };

        // Writing its own dependency mid-run only reaches the scheduler when
        // the effect opted in.
        assert_eq!(build(false), 0);
        assert_eq!(build(true), 1);
    }

    #[test]
    fn on_track_and_on_trigger_hooks_fire() {
        let signal = Signal::new(0);
        let tracked = Rc::new(Cell::new(0));
        let triggered = Rc::new(Cell::new(0));

        let signal_clone = signal.clone();
        let (tracked_clone, triggered_clone) = (tracked.clone(), triggered.clone());
        let _runner = effect_with(
            move || {
                signal_clone.get();
                signal_clone.get();
            },
            EffectOptions::default()
                .on_track(move |_| tracked_clone.set(tracked_clone.get() + 1))
                .on_trigger(move |_| triggered_clone.set(triggered_clone.get() + 1)),
        );
        // Second read in the same run is not a new membership
        assert_eq!(tracked.get(), 1);
        assert_eq!(triggered.get(), 0);

        signal.set(1);
        assert_eq!(triggered.get(), 1);
        // Dependency set unchanged on re-run
        assert_eq!(tracked.get(), 1);
    }

    #[test]
    fn stopped_effects_leave_the_arena() {
        let before = Runtime::effect_count();
        let runner = effect(|| {});
        assert_eq!(Runtime::effect_count(), before + 1);
        runner.stop();
        assert_eq!(Runtime::effect_count(), before);
    }
}
