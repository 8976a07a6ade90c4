//! Reactive Primitives
//!
//! This module implements the core reactive engine: dependency sets, effects,
//! the track/trigger dispatcher, signals, computeds, and watchers. These
//! primitives form the foundation of Ripple's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Deps
//!
//! A [`Dep`] is the set of effects subscribed to one observable slot: one
//! field of one container, a signal, or a computed. Reading a slot while an
//! effect is tracking adds the effect to the slot's dep; writing the slot
//! notifies every effect in it.
//!
//! ## Effects
//!
//! An effect is a re-runnable computation. Each run re-collects exactly the
//! deps it reads, so the subscription graph always matches the effect's
//! current branches, not the ones it took in the past.
//!
//! ## Signals
//!
//! A [`Signal`] is a single observable cell with its own dep.
//!
//! ## Computeds
//!
//! A [`Computed`] is a derived value that caches its result. A change to its
//! inputs only marks it dirty; it recomputes on the next read.
//!
//! # Implementation Notes
//!
//! The engine uses a thread-local runtime to detect dependencies
//! automatically. When a slot is read, the runtime checks whether an effect
//! is active and, if so, records the dependency. Effects and deps live in
//! arenas inside the runtime and refer to each other by id.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod computed;
mod context;
mod dep;
mod effect;
mod operations;
mod runtime;
mod scheduler;
mod signal;
mod subscriber;
mod watch;

pub use computed::{Computed, ComputedOptions};
pub use context::{enable_tracking, pause_tracking, reset_tracking, untracked, ReactiveContext, TrackingPause};
pub use dep::Dep;
pub use effect::{effect, effect_with, EffectOptions, EffectRunner};
pub use operations::{
    DebugOp, DebuggerEvent, Key, TargetId, TargetKind, TrackOp, TriggerOp, MAX_ARRAY_LENGTH,
};
pub use runtime::{DebugHook, Runtime, Scheduler, MAX_MARKER_BITS};
pub use scheduler::{JobQueue, RECURSION_LIMIT};
pub use signal::Signal;
pub use subscriber::{DepId, EffectId};
pub use watch::{watch, WatchHandle, WatchOptions};

pub(crate) use runtime::try_with_runtime;
