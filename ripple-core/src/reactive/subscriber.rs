//! Handle types for the reactive arena.
//!
//! Effects and dependency sets live in the thread-local runtime and are
//! addressed by small integer handles instead of pointers. A `Dep` stores
//! `EffectId`s and an effect stores `DepId`s, so the bidirectional membership
//! between them never forms an ownership cycle.

use std::fmt;

use super::runtime::with_runtime;

/// Generational handle to an effect in the runtime arena.
///
/// Stopping an effect frees its slot and bumps the slot's generation, so any
/// `EffectId` still held elsewhere goes inert instead of aliasing whatever
/// effect reuses the slot later.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId {
    index: u32,
    generation: u32,
}

impl EffectId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) fn generation(self) -> u32 {
        self.generation
    }

    /// Whether the effect behind this handle is still live (not stopped).
    pub fn is_live(self) -> bool {
        with_runtime(|rt| rt.effect(self).is_some())
    }

    /// Run the effect's job directly, bypassing its scheduler.
    ///
    /// This is what a deferring scheduler calls once it decides the effect
    /// should actually re-run. Returns `false` if the effect has been stopped.
    pub fn run(self) -> bool {
        match with_runtime(|rt| rt.job(self)) {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EffectId({}v{})", self.index, self.generation)
    }
}

/// Handle to a dependency set in the runtime arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepId(u32);

impl DepId {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, EffectOptions};

    #[test]
    fn stopped_effect_handle_goes_inert() {
        let runner = effect(|| {});
        let id = runner.id();
        assert!(id.is_live());

        runner.stop();
        assert!(!id.is_live());
        assert!(!id.run());
    }

    #[test]
    fn reused_slot_gets_new_generation() {
        let first = effect(|| {});
        let stale = first.id();
        first.stop();

        let second = effect_with_lazy();
        assert_ne!(stale, second);
        assert!(!stale.is_live());
        assert!(second.is_live());
    }

    fn effect_with_lazy() -> EffectId {
        crate::reactive::effect_with(|| {}, EffectOptions::default().lazy()).id()
    }
}
