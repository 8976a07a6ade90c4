//! Observable State
//!
//! This module turns plain containers into observable state. A
//! [`Container`] holds the data; an [`Observable`] wrapper intercepts every
//! read and write of it and reports them to the reactive runtime.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use ripple_core::observable::Observable;
//! use ripple_core::reactive::effect;
//! use serde_json::json;
//!
//! let state = Observable::reactive(json!({"a": 1, "b": 2})).unwrap();
//! let seen = Rc::new(Cell::new(0.0));
//!
//! let (state_clone, seen_clone) = (state.clone(), seen.clone());
//! effect(move || {
//!     let a = state_clone.get("a").as_f64().unwrap_or(0.0);
//!     let b = state_clone.get("b").as_f64().unwrap_or(0.0);
//!     seen_clone.set(a + b);
//! });
//! assert_eq!(seen.get(), 3.0);
//!
//! state.set("a", 10).unwrap();
//! assert_eq!(seen.get(), 12.0);
//! ```
//!
//! # Identity
//!
//! Containers have no stable address to key deps by, so each one carries a
//! [`TargetId`](crate::reactive::TargetId). Wrappers are cached per
//! container and mode in a registry holding weak references.

mod array;
mod container;
mod proxy;
mod registry;
mod value;

use std::collections::HashSet;

pub use container::Container;
pub use proxy::{Mode, Observable, ReactiveFlag};
pub use value::Value;

use crate::error::Result;
use crate::reactive::{Key, TargetId};

/// Read/write surface of observable state.
///
/// Implementors report every read to
/// [`Runtime::track`](crate::reactive::Runtime::track) and every write that
/// changed something to [`Runtime::trigger`](crate::reactive::Runtime::trigger).
pub trait Observe {
    fn get(&self, key: Key) -> Value;
    fn set(&self, key: Key, value: Value) -> Result<()>;
    fn has(&self, key: Key) -> bool;
    fn delete(&self, key: Key) -> Result<bool>;
}

impl Observe for Observable {
    fn get(&self, key: Key) -> Value {
        Observable::get(self, key)
    }

    fn set(&self, key: Key, value: Value) -> Result<()> {
        Observable::set(self, key, value)
    }

    fn has(&self, key: Key) -> bool {
        Observable::has(self, key)
    }

    fn delete(&self, key: Key) -> Result<bool> {
        Observable::delete(self, key)
    }
}

/// Wrap a value as deep reactive state.
///
/// Primitives, frozen containers, and containers marked raw come back
/// unchanged. Wrapping a wrapper returns it.
pub fn reactive(value: impl Into<Value>) -> Value {
    proxy::wrap(value.into(), Mode::Reactive)
}

/// Like [`reactive`], but nested containers are not wrapped when read.
pub fn shallow_reactive(value: impl Into<Value>) -> Value {
    proxy::wrap(value.into(), Mode::ShallowReactive)
}

/// Wrap a value as deep readonly state. Writes fail. Reads are tracked only
/// when `value` is a reactive wrapper.
pub fn readonly(value: impl Into<Value>) -> Value {
    proxy::wrap(value.into(), Mode::Readonly)
}

pub fn shallow_readonly(value: impl Into<Value>) -> Value {
    proxy::wrap(value.into(), Mode::ShallowReadonly)
}

/// Whether the value is a wrapper whose reads are tracked. True for a
/// readonly view of a reactive wrapper.
pub fn is_reactive(value: &Value) -> bool {
    value.as_observable().is_some_and(Observable::is_reactive)
}

pub fn is_readonly(value: &Value) -> bool {
    value.as_observable().is_some_and(Observable::is_readonly)
}

pub fn is_shallow(value: &Value) -> bool {
    value.as_observable().is_some_and(Observable::is_shallow)
}

/// Whether the value is any kind of wrapper.
pub fn is_proxy(value: &Value) -> bool {
    value.as_observable().is_some()
}

/// The raw container behind a wrapper; other values are returned as is.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Observable(observable) => Value::Container(observable.raw().clone()),
        other => other.clone(),
    }
}

/// Exclude a container from wrapping. Returns the value unchanged.
pub fn mark_raw(value: Value) -> Value {
    if let Value::Container(container) = &value {
        container.mark_skip();
    }
    value
}

/// Read every field of `value`, recursively, so the active effect depends
/// on all of it. Cycles are visited once.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    traverse_inner(value, &mut seen);
}

fn traverse_inner(value: &Value, seen: &mut HashSet<TargetId>) {
    let Value::Observable(observable) = value else {
        return;
    };
    if !seen.insert(observable.id()) {
        return;
    }
    for key in observable.keys() {
        traverse_inner(&observable.get(key), seen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::reactive::{watch, WatchOptions};

    #[test]
    fn free_functions_report_wrapper_kind() {
        let state = reactive(json!({"a": 1}));
        assert!(is_reactive(&state));
        assert!(is_proxy(&state));
        assert!(!is_readonly(&state));

        let ro = readonly(to_raw(&state));
        assert!(is_readonly(&ro));
        assert!(!is_reactive(&ro));

        let view = readonly(state.clone());
        assert!(is_readonly(&view));
        assert!(is_reactive(&view));

        let shallow = shallow_reactive(to_raw(&state));
        assert!(is_shallow(&shallow));

        let plain = reactive(5);
        assert!(!is_proxy(&plain));
        assert_eq!(to_raw(&plain), Value::from(5));
    }

    #[test]
    fn mark_raw_opts_out_of_wrapping() {
        let raw = mark_raw(Value::from(json!({"a": 1})));
        let wrapped = reactive(raw.clone());
        assert!(!is_proxy(&wrapped));
        assert_eq!(wrapped, raw);
    }

    #[test]
    fn deep_watch_reads_nested_state() {
        let state = Observable::reactive(json!({"nested": {"list": [1, 2]}})).unwrap();
        let calls = Rc::new(Cell::new(0));

        let (state_clone, calls_clone) = (state.clone(), calls.clone());
        let _handle = watch(
            move || Value::from(state_clone.clone()),
            move |_, _| calls_clone.set(calls_clone.get() + 1),
            WatchOptions::default().deep(),
        );

        let list = state.get("nested").as_observable().unwrap().get("list");
        list.as_observable().unwrap().push([3]).unwrap();
        assert_eq!(calls.get(), 1);
    }

    fn bump(state: &impl Observe, key: &str) -> Result<()> {
        let current = state.get(Key::from(key)).as_f64().unwrap_or(0.0);
        state.set(Key::from(key), Value::from(current + 1.0))
    }

    #[test]
    fn generic_code_goes_through_interception() {
        let state = Observable::reactive(json!({"n": 1})).unwrap();
        let seen = Rc::new(Cell::new(0.0));

        let (state_clone, seen_clone) = (state.clone(), seen.clone());
        crate::reactive::effect(move || {
            seen_clone.set(Observe::get(&state_clone, Key::from("n")).as_f64().unwrap_or(0.0));
        });

        bump(&state, "n").unwrap();
        assert_eq!(seen.get(), 2.0);
        assert!(Observe::has(&state, Key::from("n")));
        assert!(Observe::delete(&state, Key::from("n")).unwrap());
    }

    #[test]
    fn traverse_survives_cycles() {
        let state = Observable::reactive(json!({})).unwrap();
        state.set("me", state.clone()).unwrap();
        traverse(&Value::from(state.clone()));
        // Break the cycle so the container can be released
        state.delete("me").unwrap();
    }
}
