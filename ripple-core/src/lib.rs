//! Ripple Core
//!
//! This crate provides a fine-grained dependency tracking and change
//! propagation engine. It implements:
//!
//! - Dependency sets and re-runnable effects with per-run dependency diffing
//! - A track/trigger dispatcher keyed by target and field
//! - Observable containers (objects, arrays, maps) with reactive, readonly,
//!   and shallow wrappers
//! - Lazily recomputed, cached derived values
//! - Signals, watchers, and a deduplicating job queue
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: the runtime, effects, deps, signals, computeds, and watchers
//! - `observable`: containers, dynamic values, and intercepting wrappers
//! - `error`: the error type returned by rejected writes
//!
//! All state is single-threaded. The runtime lives in a thread local, and
//! every handle is `!Send`.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use ripple_core::reactive::{effect, Computed, Signal};
//!
//! let count = Signal::new(1);
//!
//! let count_clone = count.clone();
//! let doubled = Computed::new(move || count_clone.get() * 2);
//!
//! let seen = Rc::new(Cell::new(0));
//! let (doubled_clone, seen_clone) = (doubled.clone(), seen.clone());
//! effect(move || seen_clone.set(doubled_clone.get()));
//! assert_eq!(seen.get(), 2);
//!
//! count.set(5);
//! assert_eq!(seen.get(), 10);
//! ```

pub mod error;
pub mod observable;
pub mod reactive;

pub use error::{ReactiveError, Result};
