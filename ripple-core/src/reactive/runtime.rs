//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects observable state,
//! computeds, and effects. It owns the effect arena, the dep arena, and the
//! registry mapping each `(target, key)` slot to its dep.
//!
//! # How It Works
//!
//! 1. When an effect runs it becomes the active effect.
//!
//! 2. Every tracked read while it is active binds it into the dep of the slot
//!    that was read (see [`Runtime::track`]).
//!
//! 3. When a slot is written, the runtime:
//!    a. Collects the deps the write affects
//!    b. Deduplicates their subscribers into one batch, computeds first
//!    c. Invokes each effect directly, or its scheduler if it has one
//!
//! # Threading
//!
//! The runtime is thread-local. All operations are synchronous and never
//! re-entered while the runtime is borrowed: user closures (effect bodies,
//! schedulers, hooks, stop callbacks) are always cloned out and invoked after
//! the borrow is released, and never dropped while it is held.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

use super::dep::Dep;
use super::operations::{DebugOp, DebuggerEvent, Key, TargetId, TargetKind, TrackOp, TriggerOp};
use super::subscriber::{DepId, EffectId};

/// Bit markers cover this many levels of nested effects. Deeper runs fall
/// back to clearing and re-collecting the whole dependency list.
pub const MAX_MARKER_BITS: u32 = 30;

pub(crate) type Job = Rc<dyn Fn()>;

/// Decides when a notified effect actually re-runs. Receives the effect's id;
/// calling [`EffectId::run`] runs it.
pub type Scheduler = Rc<dyn Fn(EffectId)>;

/// Debugger hook fired on track or trigger.
pub type DebugHook = Rc<dyn Fn(&DebuggerEvent)>;

pub(crate) type StopHook = Rc<dyn Fn()>;

pub(crate) type Batch = SmallVec<[EffectId; 8]>;

/// Per-effect bookkeeping kept in the arena.
pub(crate) struct EffectState {
    pub(crate) job: Job,
    pub(crate) scheduler: Option<Scheduler>,
    pub(crate) deps: SmallVec<[DepId; 4]>,
    pub(crate) parent: Option<EffectId>,
    pub(crate) computed: bool,
    pub(crate) allow_recurse: bool,
    pub(crate) defer_stop: bool,
    pub(crate) on_stop: Option<StopHook>,
    pub(crate) on_track: Option<DebugHook>,
    pub(crate) on_trigger: Option<DebugHook>,
}

impl EffectState {
    pub(crate) fn new(job: Job) -> Self {
        Self {
            job,
            scheduler: None,
            deps: SmallVec::new(),
            parent: None,
            computed: false,
            allow_recurse: false,
            defer_stop: false,
            on_stop: None,
            on_track: None,
            on_trigger: None,
        }
    }
}

struct EffectSlot {
    generation: u32,
    state: Option<EffectState>,
}

/// Result of trying to start an effect run.
pub(crate) enum RunStart {
    /// Effect is stopped: run the function untracked.
    Inactive,
    /// Effect is already on the active chain: abort.
    Reentrant,
    /// Effect is now active; finish with [`RuntimeState::finish_run`].
    Tracking(RunScope),
}

/// What a run must restore when it ends.
pub(crate) struct RunScope {
    pub(crate) effect: EffectId,
    prev_should_track: bool,
}

/// How a triggered effect is dispatched.
pub(crate) enum Dispatch {
    Skip,
    Schedule(Scheduler),
    Run(Job),
}

pub(crate) struct RuntimeState {
    effects: Vec<EffectSlot>,
    free_effects: Vec<u32>,
    deps: Vec<Option<Dep>>,
    free_deps: Vec<u32>,
    targets: HashMap<TargetId, IndexMap<Key, DepId>>,
    active: Option<EffectId>,
    should_track: bool,
    track_stack: Vec<bool>,
    track_depth: u32,
    track_op_bit: u32,
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::new());
}

/// Borrow the thread's runtime.
///
/// Callers must not invoke user code inside `f`.
pub(crate) fn with_runtime<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> R {
    RUNTIME.with(|rt| f(&mut rt.borrow_mut()))
}

/// Like [`with_runtime`], but silently does nothing if the runtime is busy or
/// already torn down. Used from `Drop` impls.
pub(crate) fn try_with_runtime<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> Option<R> {
    RUNTIME
        .try_with(|rt| rt.try_borrow_mut().ok().map(|mut rt| f(&mut rt)))
        .ok()
        .flatten()
}

fn op_bit(depth: u32) -> u32 {
    1u32.checked_shl(depth).unwrap_or(0)
}

fn state_of(effects: &[EffectSlot], id: EffectId) -> Option<&EffectState> {
    effects
        .get(id.index())
        .filter(|slot| slot.generation == id.generation())
        .and_then(|slot| slot.state.as_ref())
}

fn state_of_mut(effects: &mut [EffectSlot], id: EffectId) -> Option<&mut EffectState> {
    effects
        .get_mut(id.index())
        .filter(|slot| slot.generation == id.generation())
        .and_then(|slot| slot.state.as_mut())
}

/// Key reported to debugger hooks for deps owned by a signal or computed.
fn value_key() -> Key {
    Key::from("value")
}

impl RuntimeState {
    fn new() -> Self {
        Self {
            effects: Vec::new(),
            free_effects: Vec::new(),
            deps: Vec::new(),
            free_deps: Vec::new(),
            targets: HashMap::new(),
            active: None,
            should_track: true,
            track_stack: Vec::new(),
            track_depth: 0,
            track_op_bit: 1,
        }
    }

    // ------------------------------------------------------------------
    // Effect arena
    // ------------------------------------------------------------------

    pub(crate) fn insert_effect(&mut self, build: impl FnOnce(EffectId) -> EffectState) -> EffectId {
        let index = match self.free_effects.pop() {
            Some(index) => index,
            None => {
                self.effects.push(EffectSlot {
                    generation: 0,
                    state: None,
                });
                (self.effects.len() - 1) as u32
            }
        };
        let slot = &mut self.effects[index as usize];
        let id = EffectId::new(index, slot.generation);
        slot.state = Some(build(id));
        id
    }

    pub(crate) fn effect(&self, id: EffectId) -> Option<&EffectState> {
        state_of(&self.effects, id)
    }

    pub(crate) fn effect_mut(&mut self, id: EffectId) -> Option<&mut EffectState> {
        state_of_mut(&mut self.effects, id)
    }

    /// Take an effect out of the arena, invalidating its id.
    ///
    /// The returned state holds user closures; drop it after releasing the
    /// runtime borrow.
    fn remove_effect(&mut self, id: EffectId) -> Option<EffectState> {
        let slot = self
            .effects
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())?;
        let state = slot.state.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_effects.push(id.index() as u32);
        Some(state)
    }

    pub(crate) fn job(&self, id: EffectId) -> Option<Job> {
        self.effect(id).map(|state| Rc::clone(&state.job))
    }

    pub(crate) fn live_effects(&self) -> usize {
        self.effects.iter().filter(|slot| slot.state.is_some()).count()
    }

    // ------------------------------------------------------------------
    // Dep arena
    // ------------------------------------------------------------------

    pub(crate) fn alloc_dep(&mut self) -> DepId {
        match self.free_deps.pop() {
            Some(index) => {
                self.deps[index as usize] = Some(Dep::new());
                DepId::new(index)
            }
            None => {
                self.deps.push(Some(Dep::new()));
                DepId::new((self.deps.len() - 1) as u32)
            }
        }
    }

    pub(crate) fn dep(&self, id: DepId) -> Option<&Dep> {
        self.deps.get(id.index()).and_then(Option::as_ref)
    }

    /// Release a dep, scrubbing it from every member effect's list.
    pub(crate) fn free_dep(&mut self, id: DepId) {
        let Some(dep) = self.deps.get_mut(id.index()).and_then(Option::take) else {
            return;
        };
        for effect in dep.iter() {
            if let Some(state) = state_of_mut(&mut self.effects, effect) {
                state.deps.retain(|d| *d != id);
            }
        }
        self.free_deps.push(id.index() as u32);
    }

    pub(crate) fn live_deps(&self) -> usize {
        self.deps.iter().filter(|dep| dep.is_some()).count()
    }

    /// Find or create the dep for a `(target, key)` slot.
    fn dep_for(&mut self, target: TargetId, key: &Key) -> DepId {
        if let Some(&dep) = self.targets.get(&target).and_then(|deps| deps.get(key)) {
            return dep;
        }
        let dep = self.alloc_dep();
        self.targets.entry(target).or_default().insert(key.clone(), dep);
        dep
    }

    pub(crate) fn slot_dep(&self, target: TargetId, key: &Key) -> Option<DepId> {
        self.targets.get(&target).and_then(|deps| deps.get(key)).copied()
    }

    /// Drop every dep registered for a container.
    pub(crate) fn dispose_target(&mut self, target: TargetId) {
        if let Some(deps) = self.targets.remove(&target) {
            for dep in deps.into_values() {
                self.free_dep(dep);
            }
        }
    }

    // ------------------------------------------------------------------
    // Tracking state
    // ------------------------------------------------------------------

    pub(crate) fn active(&self) -> Option<EffectId> {
        self.active
    }

    pub(crate) fn is_tracking(&self) -> bool {
        self.should_track && self.active.is_some()
    }

    pub(crate) fn track_depth(&self) -> u32 {
        self.track_depth
    }

    pub(crate) fn push_tracking(&mut self, enabled: bool) {
        self.track_stack.push(self.should_track);
        self.should_track = enabled;
    }

    pub(crate) fn pop_tracking(&mut self) {
        self.should_track = self.track_stack.pop().unwrap_or(true);
    }

    /// Record the active effect's membership in `dep`.
    ///
    /// Returns the effect's `on_track` hook if a new membership was recorded.
    pub(crate) fn track_dep(&mut self, dep: DepId) -> Option<(DebugHook, EffectId)> {
        if !self.should_track {
            return None;
        }
        let active = self.active?;
        let bit = self.track_op_bit;
        let marker_mode = self.track_depth <= MAX_MARKER_BITS;

        let entry = self.deps.get_mut(dep.index()).and_then(Option::as_mut)?;
        let should_add = if marker_mode {
            if entry.new_tracked(bit) {
                false
            } else {
                entry.mark_new_tracked(bit);
                !entry.was_tracked(bit)
            }
        } else {
            !entry.contains(active)
        };
        if !should_add {
            return None;
        }
        entry.add(active);

        let state = state_of_mut(&mut self.effects, active)?;
        state.deps.push(dep);
        state.on_track.clone().map(|hook| (hook, active))
    }

    // ------------------------------------------------------------------
    // Run protocol
    // ------------------------------------------------------------------

    pub(crate) fn begin_run(&mut self, id: EffectId) -> RunStart {
        if self.effect(id).is_none() {
            return RunStart::Inactive;
        }

        if self.on_active_chain(id) {
            return RunStart::Reentrant;
        }

        let parent = self.active;
        let prev_should_track = self.should_track;
        if let Some(state) = self.effect_mut(id) {
            state.parent = parent;
        }
        self.active = Some(id);
        self.should_track = true;
        self.track_depth += 1;
        self.track_op_bit = op_bit(self.track_depth);

        if self.track_depth <= MAX_MARKER_BITS {
            self.init_markers(id);
        } else {
            tracing::debug!(
                effect = ?id,
                depth = self.track_depth,
                "tracking depth exceeds marker bits, using full cleanup"
            );
            self.cleanup_effect(id);
        }

        RunStart::Tracking(RunScope {
            effect: id,
            prev_should_track,
        })
    }

    /// Finish a run started by [`begin_run`](Self::begin_run).
    ///
    /// Returns `true` if a stop was requested while the run was in progress.
    pub(crate) fn finish_run(&mut self, scope: &RunScope) -> bool {
        let id = scope.effect;
        if self.track_depth <= MAX_MARKER_BITS {
            self.finalize_markers(id);
        }
        self.track_depth = self.track_depth.saturating_sub(1);
        self.track_op_bit = op_bit(self.track_depth);
        self.should_track = scope.prev_should_track;

        let (parent, defer_stop) = match state_of_mut(&mut self.effects, id) {
            Some(state) => (state.parent.take(), state.defer_stop),
            None => (None, false),
        };
        self.active = parent;
        defer_stop
    }

    fn init_markers(&mut self, id: EffectId) {
        let bit = self.track_op_bit;
        let Some(state) = state_of(&self.effects, id) else {
            return;
        };
        for dep in &state.deps {
            if let Some(entry) = self.deps.get_mut(dep.index()).and_then(Option::as_mut) {
                entry.mark_was_tracked(bit);
            }
        }
    }

    fn finalize_markers(&mut self, id: EffectId) {
        let bit = self.track_op_bit;
        let Some(state) = state_of_mut(&mut self.effects, id) else {
            return;
        };
        let mut deps = std::mem::take(&mut state.deps);

        deps.retain(|dep| {
            let Some(entry) = self.deps.get_mut(dep.index()).and_then(Option::as_mut) else {
                return false;
            };
            let keep = !(entry.was_tracked(bit) && !entry.new_tracked(bit));
            if !keep {
                entry.delete(id);
            }
            entry.clear_markers(bit);
            keep
        });

        if let Some(state) = state_of_mut(&mut self.effects, id) {
            state.deps = deps;
        }
    }

    fn cleanup_effect(&mut self, id: EffectId) {
        let Some(state) = state_of_mut(&mut self.effects, id) else {
            return;
        };
        let deps = std::mem::take(&mut state.deps);
        for dep in deps {
            if let Some(entry) = self.deps.get_mut(dep.index()).and_then(Option::as_mut) {
                entry.delete(id);
            }
        }
    }

    fn on_active_chain(&self, id: EffectId) -> bool {
        let mut ancestor = self.active;
        while let Some(current) = ancestor {
            if current == id {
                return true;
            }
            ancestor = self.effect(current).and_then(|state| state.parent);
        }
        false
    }

    /// Stop an effect, or defer the stop if it is running (possibly as the
    /// parent of the current run).
    ///
    /// Returns the removed state; the caller fires `on_stop` and drops it
    /// outside the borrow.
    pub(crate) fn stop(&mut self, id: EffectId) -> Option<EffectState> {
        if self.on_active_chain(id) {
            if let Some(state) = self.effect_mut(id) {
                state.defer_stop = true;
                tracing::debug!(effect = ?id, "stop requested while running, deferring");
            }
            return None;
        }
        self.cleanup_effect(id);
        let state = self.remove_effect(id)?;
        tracing::debug!(effect = ?id, "effect stopped");
        Some(state)
    }

    // ------------------------------------------------------------------
    // Trigger
    // ------------------------------------------------------------------

    /// Deps of `target` affected by `op`.
    fn affected_deps(&self, target: TargetId, kind: TargetKind, op: &TriggerOp) -> SmallVec<[DepId; 4]> {
        let mut affected = SmallVec::new();
        let Some(deps) = self.targets.get(&target) else {
            return affected;
        };
        let lookup = |key: &Key| deps.get(key).copied();

        match op {
            TriggerOp::Clear => affected.extend(deps.values().copied()),
            TriggerOp::Reindex { from, length_changed } => {
                for (key, &dep) in deps {
                    let hit = match key {
                        Key::Length => *length_changed,
                        Key::Index(index) => index >= from,
                        _ => false,
                    };
                    if hit {
                        affected.push(dep);
                    }
                }
            }
            TriggerOp::Set(key) => {
                affected.extend(lookup(key));
                if kind == TargetKind::Map {
                    affected.extend(lookup(&Key::Iterate));
                }
            }
            TriggerOp::Add(key) | TriggerOp::Delete(key) => {
                affected.extend(lookup(key));
                match kind {
                    TargetKind::Array => {
                        // A new index moves the length; deleting one does not.
                        if matches!(op, TriggerOp::Add(Key::Index(_))) {
                            affected.extend(lookup(&Key::Length));
                        }
                    }
                    TargetKind::Object => affected.extend(lookup(&Key::Iterate)),
                    TargetKind::Map => {
                        affected.extend(lookup(&Key::Iterate));
                        affected.extend(lookup(&Key::MapKeyIterate));
                    }
                }
            }
        }
        affected
    }

    /// Collect the subscribers of `deps` into one deduplicated batch with
    /// computeds ahead of plain effects.
    pub(crate) fn collect_batch(&self, deps: &[DepId]) -> Batch {
        let mut seen: IndexSet<EffectId> = IndexSet::new();
        for &dep in deps {
            if let Some(entry) = self.dep(dep) {
                seen.extend(entry.iter());
            }
        }
        let is_computed = |id: &EffectId| self.effect(*id).is_some_and(|state| state.computed);
        let mut batch: Batch = seen.iter().copied().filter(is_computed).collect();
        batch.extend(seen.iter().copied().filter(|id| !is_computed(id)));
        batch
    }

    pub(crate) fn collect_target(&self, target: TargetId, kind: TargetKind, op: &TriggerOp) -> Batch {
        let deps = self.affected_deps(target, kind, op);
        self.collect_batch(&deps)
    }

    /// Decide how to invoke a triggered effect, as of right now.
    pub(crate) fn dispatch(&self, id: EffectId) -> (Dispatch, Option<DebugHook>) {
        let Some(state) = self.effect(id) else {
            return (Dispatch::Skip, None);
        };
        if self.active == Some(id) && !state.allow_recurse {
            return (Dispatch::Skip, None);
        }
        let dispatch = match &state.scheduler {
            Some(scheduler) => Dispatch::Schedule(Rc::clone(scheduler)),
            None => Dispatch::Run(Rc::clone(&state.job)),
        };
        (dispatch, state.on_trigger.clone())
    }
}

/// Public face of the track/trigger dispatcher.
///
/// Container types call [`Runtime::track`] on every intercepted read and
/// [`Runtime::trigger`] on every write that changed something.
pub struct Runtime;

impl Runtime {
    /// Bind the active effect into the dep for `(target, key)`.
    ///
    /// A no-op unless tracking is enabled and an effect is active.
    pub fn track(target: TargetId, op: TrackOp, key: Key) {
        let hook = with_runtime(|rt| {
            if !rt.is_tracking() {
                return None;
            }
            let dep = rt.dep_for(target, &key);
            rt.track_dep(dep)
        });
        if let Some((hook, effect)) = hook {
            hook(&DebuggerEvent {
                effect,
                target: Some(target),
                key: Some(key),
                op: DebugOp::Track(op),
            });
        }
    }

    /// Notify every effect depending on the slots `op` affects.
    pub fn trigger(target: TargetId, kind: TargetKind, op: TriggerOp) {
        let batch = with_runtime(|rt| rt.collect_target(target, kind, &op));
        if batch.is_empty() {
            return;
        }
        tracing::trace!(target = target.raw(), ?op, effects = batch.len(), "trigger");
        run_batch(&batch, Some(target), op);
    }

    /// The effect currently tracking, if any.
    pub fn current_effect() -> Option<EffectId> {
        with_runtime(|rt| rt.active())
    }

    /// Whether a read right now would be tracked.
    pub fn is_tracking() -> bool {
        with_runtime(|rt| rt.is_tracking())
    }

    /// Number of effects subscribed to `(target, key)`.
    pub fn subscriber_count(target: TargetId, key: &Key) -> usize {
        with_runtime(|rt| {
            rt.slot_dep(target, key)
                .and_then(|dep| rt.dep(dep))
                .map_or(0, Dep::len)
        })
    }

    /// Number of deps an effect currently belongs to.
    pub fn dependency_count(effect: EffectId) -> usize {
        with_runtime(|rt| rt.effect(effect).map_or(0, |state| state.deps.len()))
    }

    /// Number of effects that have not been stopped.
    pub fn effect_count() -> usize {
        with_runtime(|rt| rt.live_effects())
    }

    /// Number of allocated deps.
    pub fn dep_count() -> usize {
        with_runtime(|rt| rt.live_deps())
    }
}

/// Notify the subscribers of a single dep owned by a signal or computed.
pub(crate) fn trigger_dep(dep: DepId) {
    let batch = with_runtime(|rt| rt.collect_batch(&[dep]));
    if batch.is_empty() {
        return;
    }
    tracing::trace!(?dep, effects = batch.len(), "trigger");
    run_batch(&batch, None, TriggerOp::Set(value_key()));
}

/// Track a read of a dep owned by a signal or computed.
pub(crate) fn track_dep(dep: DepId) {
    let hook = with_runtime(|rt| rt.track_dep(dep));
    if let Some((hook, effect)) = hook {
        hook(&DebuggerEvent {
            effect,
            target: None,
            key: Some(value_key()),
            op: DebugOp::Track(TrackOp::Get),
        });
    }
}

fn run_batch(batch: &[EffectId], target: Option<TargetId>, op: TriggerOp) {
    let key = op.key().cloned();
    for &id in batch {
        let (dispatch, hook) = with_runtime(|rt| rt.dispatch(id));
        if matches!(dispatch, Dispatch::Skip) {
            continue;
        }
        if let Some(hook) = hook {
            hook(&DebuggerEvent {
                effect: id,
                target,
                key: key.clone(),
                op: DebugOp::Trigger(op.clone()),
            });
        }
        match dispatch {
            Dispatch::Schedule(scheduler) => scheduler(id),
            Dispatch::Run(job) => job(),
            Dispatch::Skip => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::reactive::effect;

    #[test]
    fn track_outside_effect_creates_nothing() {
        let target = TargetId::next();
        Runtime::track(target, TrackOp::Get, Key::from("a"));
        assert!(with_runtime(|rt| rt.slot_dep(target, &Key::from("a"))).is_none());
    }

    #[test]
    fn runtime_notifies_subscribers() {
        let target = TargetId::next();
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();

        let runner = effect(move || {
            Runtime::track(target, TrackOp::Get, Key::from("a"));
            runs_clone.set(runs_clone.get() + 1);
        });

        assert_eq!(runs.get(), 1);
        assert_eq!(Runtime::subscriber_count(target, &Key::from("a")), 1);

        Runtime::trigger(target, TargetKind::Object, TriggerOp::Set(Key::from("a")));
        assert_eq!(runs.get(), 2);

        // Unrelated key
        Runtime::trigger(target, TargetKind::Object, TriggerOp::Set(Key::from("b")));
        assert_eq!(runs.get(), 2);

        runner.stop();
    }

    #[test]
    fn add_notifies_iteration_dep() {
        let target = TargetId::next();
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();

        let _runner = effect(move || {
            Runtime::track(target, TrackOp::Iterate, Key::Iterate);
            runs_clone.set(runs_clone.get() + 1);
        });

        Runtime::trigger(target, TargetKind::Object, TriggerOp::Set(Key::from("x")));
        assert_eq!(runs.get(), 1);

        Runtime::trigger(target, TargetKind::Object, TriggerOp::Add(Key::from("x")));
        assert_eq!(runs.get(), 2);

        Runtime::trigger(target, TargetKind::Object, TriggerOp::Delete(Key::from("x")));
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn reindex_hits_length_and_trailing_indices() {
        let target = TargetId::next();
        let seen = Rc::new(Cell::new(0));

        let mut runners = Vec::new();
        for key in [Key::Index(0), Key::Index(2), Key::Index(5), Key::Length] {
            let seen = seen.clone();
            runners.push(effect(move || {
                Runtime::track(target, TrackOp::Get, key.clone());
                seen.set(seen.get() + 1);
            }));
        }
        assert_eq!(seen.get(), 4);

        Runtime::trigger(
            target,
            TargetKind::Array,
            TriggerOp::Reindex {
                from: 2,
                length_changed: true,
            },
        );
        // Index(2), Index(5), Length
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn clear_hits_every_dep_of_target() {
        let target = TargetId::next();
        let seen = Rc::new(Cell::new(0));

        let mut runners = Vec::new();
        for key in [Key::from("a"), Key::from("b"), Key::Iterate] {
            let seen = seen.clone();
            runners.push(effect(move || {
                Runtime::track(target, TrackOp::Get, key.clone());
                seen.set(seen.get() + 1);
            }));
        }

        Runtime::trigger(target, TargetKind::Map, TriggerOp::Clear);
        assert_eq!(seen.get(), 6);
    }

    #[test]
    fn effect_reading_many_keys_runs_once_per_batch() {
        let target = TargetId::next();
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();

        let _runner = effect(move || {
            Runtime::track(target, TrackOp::Get, Key::from("a"));
            Runtime::track(target, TrackOp::Get, Key::from("b"));
            runs_clone.set(runs_clone.get() + 1);
        });

        Runtime::trigger(target, TargetKind::Map, TriggerOp::Clear);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn dispose_target_frees_deps_and_memberships() {
        let target = TargetId::next();
        let runner = effect(move || {
            Runtime::track(target, TrackOp::Get, Key::from("a"));
        });
        assert_eq!(Runtime::dependency_count(runner.id()), 1);

        let before = Runtime::dep_count();
        with_runtime(|rt| rt.dispose_target(target));

        assert_eq!(Runtime::dep_count(), before - 1);
        assert_eq!(Runtime::dependency_count(runner.id()), 0);
    }
}
