//! Subscription sets.
//!
//! A `Dep` is the set of effects subscribed to one observable slot, plus two
//! generation bitmasks used to diff an effect's dependencies across runs
//! without rebuilding them. Bit `n` belongs to the effect running at nesting
//! depth `n`:
//!
//! - `was_tracked`: the running effect was subscribed here before this run.
//! - `new_tracked`: the running effect read this slot during this run.
//!
//! When the run finishes, a dep that was tracked before but not during the
//! run is dropped from the effect. Everything else is left alone.

use indexmap::IndexSet;

use super::EffectId;

#[derive(Debug, Default)]
pub struct Dep {
    subscribers: IndexSet<EffectId>,
    was_tracked: u32,
    new_tracked: u32,
}

impl Dep {
    /// Create an empty set with both markers cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an effect. Returns `false` if it was already a member.
    pub fn add(&mut self, effect: EffectId) -> bool {
        self.subscribers.insert(effect)
    }

    /// Remove an effect. Returns `false` if it was not a member.
    pub fn delete(&mut self, effect: EffectId) -> bool {
        self.subscribers.swap_remove(&effect)
    }

    pub fn contains(&self, effect: EffectId) -> bool {
        self.subscribers.contains(&effect)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = EffectId> + '_ {
        self.subscribers.iter().copied()
    }

    pub fn was_tracked(&self, bit: u32) -> bool {
        self.was_tracked & bit != 0
    }

    pub fn new_tracked(&self, bit: u32) -> bool {
        self.new_tracked & bit != 0
    }

    pub(crate) fn mark_was_tracked(&mut self, bit: u32) {
        self.was_tracked |= bit;
    }

    pub(crate) fn mark_new_tracked(&mut self, bit: u32) {
        self.new_tracked |= bit;
    }

    pub(crate) fn clear_markers(&mut self, bit: u32) {
        self.was_tracked &= !bit;
        self.new_tracked &= !bit;
    }
}
