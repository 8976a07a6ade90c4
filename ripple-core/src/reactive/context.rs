//! Reactive Context
//!
//! The reactive context tracks which effect is currently running and whether
//! reads are being tracked. This enables automatic dependency tracking: when
//! observable state is read, the active effect is bound into that slot's dep.
//!
//! # Implementation
//!
//! The active effect lives in the thread-local runtime, and each running
//! effect remembers the effect that was active before it (its parent). There
//! is no explicit stack; nesting follows the parent chain.
//!
//! Entering and leaving a run is done through a guard. Dropping the guard
//! restores the previous active effect and tracking flag and finalizes the
//! dep markers, even if the effect body panics.

use super::effect::stop_effect;
use super::runtime::{with_runtime, RunScope};
use super::EffectId;

/// Guard for one tracked effect run.
///
/// Created once the runtime has installed the effect as active; dropping it
/// finishes the run.
pub struct ReactiveContext {
    scope: RunScope,
}

impl ReactiveContext {
    pub(crate) fn enter(scope: RunScope) -> Self {
        Self { scope }
    }

    /// The effect currently running, if any.
    pub fn active_effect() -> Option<EffectId> {
        with_runtime(|rt| rt.active())
    }

    /// Whether a read right now would be tracked.
    pub fn is_tracking() -> bool {
        with_runtime(|rt| rt.is_tracking())
    }

    /// How many effect runs are nested on this thread right now.
    pub fn track_depth() -> u32 {
        with_runtime(|rt| rt.track_depth())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let deferred_stop = with_runtime(|rt| rt.finish_run(&self.scope));
        if deferred_stop {
            stop_effect(self.scope.effect);
        }
    }
}

/// Suspend tracking until [`reset_tracking`] is called.
pub fn pause_tracking() {
    with_runtime(|rt| rt.push_tracking(false));
}

/// Force tracking on until [`reset_tracking`] is called.
pub fn enable_tracking() {
    with_runtime(|rt| rt.push_tracking(true));
}

/// Restore the tracking flag saved by the last pause or enable.
pub fn reset_tracking() {
    with_runtime(|rt| rt.pop_tracking());
}

/// Guard that pauses tracking for its lifetime.
pub struct TrackingPause {
    _private: (),
}

impl TrackingPause {
    pub fn new() -> Self {
        pause_tracking();
        Self { _private: () }
    }
}

impl Default for TrackingPause {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TrackingPause {
    fn drop(&mut self) {
        reset_tracking();
    }
}

/// Run `f` without tracking any reads it performs.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _pause = TrackingPause::new();
    f()
}
