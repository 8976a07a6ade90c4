//! Observable wrappers.
//!
//! An [`Observable`] intercepts every read and write of a container and
//! forwards them to the dispatcher: reads call [`Runtime::track`], writes that
//! change something call [`Runtime::trigger`].
//!
//! # Modes
//!
//! | mode               | tracks reads | accepts writes | wraps nested containers |
//! |--------------------|--------------|----------------|-------------------------|
//! | `Reactive`         | yes          | yes            | yes, as `Reactive`      |
//! | `ShallowReactive`  | yes          | yes            | no                      |
//! | `Readonly`         | no           | no             | yes, as `Readonly`      |
//! | `ShallowReadonly`  | no           | no             | no                      |
//!
//! A readonly view of a reactive wrapper keeps the reactive layer
//! underneath: it still rejects writes, but its reads are tracked, and
//! nested containers read through it are readonly views of reactive
//! children.
//!
//! Nested containers are wrapped when they are read, never up front.
//!
//! # Flags
//!
//! The reserved keys in [`ReactiveFlag`] are answered by the wrapper itself
//! and never reach the container. Writing them is an error.

use std::fmt;
use std::rc::Rc;

use super::container::Container;
use super::registry;
use super::value::Value;
use crate::error::{ReactiveError, Result};
use crate::reactive::{Key, Runtime, TargetId, TargetKind, TrackOp, TriggerOp, MAX_ARRAY_LENGTH};

/// How a wrapper treats reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Reactive,
    ShallowReactive,
    Readonly,
    ShallowReadonly,
}

impl Mode {
    pub fn is_readonly(self) -> bool {
        matches!(self, Mode::Readonly | Mode::ShallowReadonly)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, Mode::ShallowReactive | Mode::ShallowReadonly)
    }

    /// Mode used for nested containers read through a deep wrapper.
    fn nested(self) -> Mode {
        if self.is_readonly() {
            Mode::Readonly
        } else {
            Mode::Reactive
        }
    }
}

/// Reserved keys answered by the wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactiveFlag {
    IsReactive,
    IsReadonly,
    IsShallow,
    Raw,
    Skip,
}

impl ReactiveFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            ReactiveFlag::IsReactive => "__v_isReactive",
            ReactiveFlag::IsReadonly => "__v_isReadonly",
            ReactiveFlag::IsShallow => "__v_isShallow",
            ReactiveFlag::Raw => "__v_raw",
            ReactiveFlag::Skip => "__v_skip",
        }
    }

    pub fn from_key(key: &Key) -> Option<ReactiveFlag> {
        match key.as_field()? {
            "__v_isReactive" => Some(ReactiveFlag::IsReactive),
            "__v_isReadonly" => Some(ReactiveFlag::IsReadonly),
            "__v_isShallow" => Some(ReactiveFlag::IsShallow),
            "__v_raw" => Some(ReactiveFlag::Raw),
            "__v_skip" => Some(ReactiveFlag::Skip),
            _ => None,
        }
    }
}

pub(crate) struct ObservableInner {
    raw: Container,
    mode: Mode,
    /// Mode of the reactive wrapper a readonly view was built over.
    source: Option<Mode>,
}

impl Drop for ObservableInner {
    fn drop(&mut self) {
        registry::unregister((self.raw.id(), self.mode, self.source));
    }
}

/// A container seen through an intercepting wrapper.
///
/// Clones are the same wrapper. Wrapping the same container in the same mode
/// twice also yields the same wrapper while the first one is alive.
#[derive(Clone)]
pub struct Observable(Rc<ObservableInner>);

impl Observable {
    /// Wrap `value` in `mode`.
    ///
    /// Fails with [`ReactiveError::Type`] if the value cannot be wrapped: a
    /// primitive, or a container that was frozen or marked raw.
    pub fn new(value: impl Into<Value>, mode: Mode) -> Result<Observable> {
        match wrap(value.into(), mode) {
            Value::Observable(observable) => Ok(observable),
            Value::Container(_) => Err(ReactiveError::Type {
                expected: "wrappable container",
                found: "frozen or raw-marked container",
            }),
            other => Err(ReactiveError::Type {
                expected: "container",
                found: other.type_name(),
            }),
        }
    }

    pub fn reactive(value: impl Into<Value>) -> Result<Observable> {
        Self::new(value, Mode::Reactive)
    }

    pub fn shallow_reactive(value: impl Into<Value>) -> Result<Observable> {
        Self::new(value, Mode::ShallowReactive)
    }

    pub fn readonly(value: impl Into<Value>) -> Result<Observable> {
        Self::new(value, Mode::Readonly)
    }

    pub fn shallow_readonly(value: impl Into<Value>) -> Result<Observable> {
        Self::new(value, Mode::ShallowReadonly)
    }

    /// The underlying container.
    pub fn raw(&self) -> &Container {
        &self.0.raw
    }

    pub fn mode(&self) -> Mode {
        self.0.mode
    }

    pub fn id(&self) -> TargetId {
        self.0.raw.id()
    }

    pub fn kind(&self) -> TargetKind {
        self.0.raw.kind()
    }

    pub fn is_readonly(&self) -> bool {
        self.0.mode.is_readonly()
    }

    /// Whether reads are tracked: a reactive wrapper, or a readonly view of
    /// one.
    pub fn is_reactive(&self) -> bool {
        !self.is_readonly() || self.0.source.is_some()
    }

    pub fn is_shallow(&self) -> bool {
        self.0.mode.is_shallow()
    }

    pub fn ptr_eq(&self, other: &Observable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ------------------------------------------------------------------
    // Interception helpers
    // ------------------------------------------------------------------

    pub(crate) fn track(&self, op: TrackOp, key: Key) {
        if self.is_reactive() {
            Runtime::track(self.id(), op, key);
        }
    }

    pub(crate) fn trigger(&self, op: TriggerOp) {
        Runtime::trigger(self.id(), self.kind(), op);
    }

    /// Present a value read from the container.
    pub(crate) fn wrap_child(&self, value: Value) -> Value {
        let value = match self.0.source {
            Some(source) if !source.is_shallow() => wrap(value, Mode::Reactive),
            _ => value,
        };
        if self.is_shallow() {
            value
        } else {
            wrap(value, self.mode().nested())
        }
    }

    /// Prepare a value for storage in the container.
    pub(crate) fn unwrap_incoming(&self, value: Value) -> Value {
        match value {
            Value::Observable(ref observable) if !self.is_shallow() && !observable.is_readonly() => {
                Value::Container(observable.raw().clone())
            }
            other => other,
        }
    }

    pub(crate) fn reject_write(&self, key: &Key) -> ReactiveError {
        tracing::warn!(target_id = self.id().raw(), %key, "write operation failed: target is readonly");
        ReactiveError::ReadonlyTarget { key: key.to_string() }
    }

    fn check_writable(&self, key: &Key) -> Result<()> {
        if ReactiveFlag::from_key(key).is_some() {
            tracing::warn!(%key, "write to reserved flag key rejected");
            return Err(ReactiveError::ReservedKey { key: key.to_string() });
        }
        if self.is_readonly() {
            return Err(self.reject_write(key));
        }
        Ok(())
    }

    /// Key whose dep is notified when the set of entries changes.
    fn iterate_key(&self) -> Key {
        match self.kind() {
            TargetKind::Array => Key::Length,
            TargetKind::Object | TargetKind::Map => Key::Iterate,
        }
    }

    fn answer_flag(&self, flag: ReactiveFlag) -> Value {
        match flag {
            ReactiveFlag::IsReactive => Value::Bool(self.is_reactive()),
            ReactiveFlag::IsReadonly => Value::Bool(self.is_readonly()),
            ReactiveFlag::IsShallow => Value::Bool(self.is_shallow()),
            ReactiveFlag::Raw => Value::Container(self.raw().clone()),
            ReactiveFlag::Skip => Value::Bool(self.raw().is_skipped()),
        }
    }

    // ------------------------------------------------------------------
    // Intercepted operations
    // ------------------------------------------------------------------

    /// Read a field, tracking it. Missing fields read as `Null`.
    ///
    /// Nested containers come back wrapped unless the wrapper is shallow.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        if let Some(flag) = ReactiveFlag::from_key(&key) {
            return self.answer_flag(flag);
        }
        let key = key.normalize(self.kind());
        let value = self.raw().lookup(&key).unwrap_or_default();
        self.track(TrackOp::Get, key);
        self.wrap_child(value)
    }

    /// Write a field. Notifies only if the key is new or the value changed
    /// by [`Value::same_value`].
    ///
    /// Writing `"length"` on an array truncates or extends it.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        self.check_writable(&key)?;
        let key = key.normalize(self.kind());
        let value = self.unwrap_incoming(value.into());

        if key == Key::Length && self.kind() == TargetKind::Array {
            return self.set_len(array_length(&value)?);
        }

        let had_key = self.raw().contains(&key);
        let old = self.raw().insert(key.clone(), value.clone())?;
        match old {
            _ if !had_key => self.trigger(TriggerOp::Add(key)),
            Some(old) if old.same_value(&value) => {}
            _ => self.trigger(TriggerOp::Set(key)),
        }
        Ok(())
    }

    /// Whether the field exists, tracking the check.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if ReactiveFlag::from_key(&key).is_some() {
            return true;
        }
        let key = key.normalize(self.kind());
        let present = self.raw().contains(&key);
        self.track(TrackOp::Has, key);
        present
    }

    /// Remove a field. Returns whether something was removed.
    pub fn delete(&self, key: impl Into<Key>) -> Result<bool> {
        let key = key.into();
        self.check_writable(&key)?;
        let key = key.normalize(self.kind());
        if !self.raw().contains(&key) {
            return Ok(false);
        }
        let removed = self.raw().remove(&key)?;
        if removed.is_none() {
            return Ok(false);
        }
        self.trigger(TriggerOp::Delete(key));
        drop(removed);
        Ok(true)
    }

    /// Own keys, tracking the entry set.
    pub fn keys(&self) -> Vec<Key> {
        let iterate = match self.kind() {
            TargetKind::Map => Key::MapKeyIterate,
            _ => self.iterate_key(),
        };
        self.track(TrackOp::Iterate, iterate);
        self.raw().keys()
    }

    /// Number of entries, tracking the entry set.
    pub fn len(&self) -> usize {
        self.track(TrackOp::Iterate, self.iterate_key());
        self.raw().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All values, wrapped like [`get`](Self::get) would.
    pub fn values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    /// All entries, wrapped like [`get`](Self::get) would.
    pub fn entries(&self) -> Vec<(Key, Value)> {
        let keys = self.raw().keys();
        let values = self.raw().values();
        match self.kind() {
            // Array iteration reads the length and every index.
            TargetKind::Array => {
                self.track(TrackOp::Iterate, Key::Length);
                for key in &keys {
                    self.track(TrackOp::Get, key.clone());
                }
            }
            TargetKind::Object | TargetKind::Map => self.track(TrackOp::Iterate, Key::Iterate),
        }
        keys.into_iter()
            .zip(values)
            .map(|(key, value)| (key, self.wrap_child(value)))
            .collect()
    }

    /// Remove every entry of a map.
    pub fn clear(&self) -> Result<()> {
        let kind = self.kind();
        if kind != TargetKind::Map {
            return Err(ReactiveError::UnsupportedOperation { op: "clear", kind });
        }
        if self.is_readonly() {
            return Err(self.reject_write(&Key::Iterate));
        }
        let removed = self.raw().take_all()?;
        if !removed.is_empty() {
            self.trigger(TriggerOp::Clear);
        }
        drop(removed);
        Ok(())
    }
}

/// Coerce a value written to `"length"` into an array length.
fn array_length(value: &Value) -> Result<usize> {
    let Some(n) = value.as_f64() else {
        return Err(ReactiveError::Type {
            expected: "number",
            found: value.type_name(),
        });
    };
    if n < 0.0 || n.fract() != 0.0 || n > MAX_ARRAY_LENGTH as f64 {
        return Err(ReactiveError::InvalidLength(n));
    }
    Ok(n as usize)
}

/// Wrap a value in `mode`, reusing an existing wrapper where possible.
///
/// Primitives and containers that are frozen or marked raw come back
/// unchanged.
pub(crate) fn wrap(value: Value, mode: Mode) -> Value {
    let (raw, source) = match value {
        Value::Observable(existing) => {
            // Any wrapper asked to be reactive, or a readonly wrapper asked to
            // be readonly, is already what the caller wants.
            if !mode.is_readonly() || existing.is_readonly() {
                return Value::Observable(existing);
            }
            (existing.raw().clone(), Some(existing.mode()))
        }
        Value::Container(container) => (container, None),
        primitive => return primitive,
    };
    if raw.is_skipped() || raw.is_frozen() {
        return Value::Container(raw);
    }

    let key = (raw.id(), mode, source);
    if let Some(inner) = registry::lookup(key) {
        return Value::Observable(Observable(inner));
    }
    let inner = Rc::new(ObservableInner { raw, mode, source });
    registry::register(key, &inner);
    Value::Observable(Observable(inner))
}

/// Wrapper identity.
impl PartialEq for Observable {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("target", &self.id().raw())
            .field("kind", &self.kind())
            .field("mode", &self.mode())
            .field("source", &self.0.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    use crate::reactive::effect;

    fn state(json: serde_json::Value) -> Observable {
        Observable::reactive(json).unwrap()
    }

    #[test]
    fn wrapping_twice_returns_same_wrapper() {
        let raw = Container::from_object([("a", 1)]);
        let first = Observable::reactive(raw.clone()).unwrap();
        let second = Observable::reactive(raw.clone()).unwrap();
        assert!(first.ptr_eq(&second));

        // Wrapping the wrapper is a no-op
        let third = Observable::reactive(first.clone()).unwrap();
        assert!(first.ptr_eq(&third));

        // Different modes get different wrappers over the same container
        let ro = Observable::readonly(raw).unwrap();
        assert!(!ro.ptr_eq(&first));
        assert!(ro.raw().ptr_eq(first.raw()));
    }

    #[test]
    fn dropped_wrapper_leaves_registry() {
        let before = registry::len();
        let raw = Container::object();
        let wrapper = Observable::reactive(raw.clone()).unwrap();
        assert_eq!(registry::len(), before + 1);
        drop(wrapper);
        assert_eq!(registry::len(), before);
    }

    #[test]
    fn primitives_and_raw_marked_containers_are_not_wrapped() {
        assert!(matches!(
            Observable::reactive(3),
            Err(ReactiveError::Type { found: "number", .. })
        ));

        let frozen = Container::object();
        frozen.freeze();
        assert!(Observable::reactive(frozen).is_err());
    }

    #[test]
    fn flags_are_answered_by_wrapper() {
        let reactive = state(json!({"__v_raw": "shadowed"}));
        assert_eq!(reactive.get("__v_isReactive"), Value::Bool(true));
        assert_eq!(reactive.get("__v_isReadonly"), Value::Bool(false));
        assert!(matches!(reactive.get("__v_raw"), Value::Container(c) if c.ptr_eq(reactive.raw())));

        assert!(matches!(
            reactive.set("__v_isReadonly", true),
            Err(ReactiveError::ReservedKey { .. })
        ));

        let ro = Observable::shallow_readonly(reactive.raw().clone()).unwrap();
        assert_eq!(ro.get("__v_isReadonly"), Value::Bool(true));
        assert_eq!(ro.get("__v_isShallow"), Value::Bool(true));
    }

    #[test]
    fn nested_containers_wrap_lazily_in_matching_mode() {
        let deep = state(json!({"inner": {"x": 1}}));
        let inner = deep.get("inner");
        let inner = inner.as_observable().unwrap();
        assert_eq!(inner.mode(), Mode::Reactive);
        // Same wrapper on every read
        assert!(deep.get("inner").as_observable().unwrap().ptr_eq(inner));

        let shallow = Observable::shallow_reactive(deep.raw().clone()).unwrap();
        assert!(matches!(shallow.get("inner"), Value::Container(_)));

        let ro = Observable::readonly(deep.raw().clone()).unwrap();
        assert_eq!(ro.get("inner").as_observable().unwrap().mode(), Mode::Readonly);
    }

    #[test]
    fn readonly_rejects_writes_and_does_not_track() {
        let ro = Observable::readonly(json!({"a": 1})).unwrap();
        assert!(matches!(ro.set("a", 2), Err(ReactiveError::ReadonlyTarget { .. })));
        assert!(matches!(ro.delete("a"), Err(ReactiveError::ReadonlyTarget { .. })));
        assert_eq!(ro.get("a"), Value::from(1));

        let ro_clone = ro.clone();
        let runner = effect(move || {
            ro_clone.get("a");
        });
        assert_eq!(runner.dependency_count(), 0);
    }

    #[test]
    fn readonly_over_reactive_tracks_through() {
        let reactive = state(json!({"a": 1, "inner": {"b": 1}}));
        let ro = Observable::readonly(reactive.clone()).unwrap();
        assert!(ro.is_readonly());
        assert!(ro.is_reactive());
        assert!(ro.raw().ptr_eq(reactive.raw()));
        assert!(Observable::readonly(reactive.clone()).unwrap().ptr_eq(&ro));

        // A readonly view of the raw container is a different wrapper
        let plain = Observable::readonly(reactive.raw().clone()).unwrap();
        assert!(!plain.ptr_eq(&ro));
        assert!(!plain.is_reactive());

        let runs = Rc::new(Cell::new(0));
        let (ro_clone, runs_clone) = (ro.clone(), runs.clone());
        let runner = effect(move || {
            ro_clone.get("a");
            if let Some(inner) = ro_clone.get("inner").as_observable() {
                inner.get("b");
            }
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(runner.dependency_count(), 3);

        reactive.set("a", 2).unwrap();
        assert_eq!(runs.get(), 2);

        let inner = ro.get("inner");
        let inner = inner.as_observable().unwrap();
        assert!(inner.is_readonly() && inner.is_reactive());
        assert!(inner.set("b", 2).is_err());
        reactive.get("inner").as_observable().unwrap().set("b", 2).unwrap();
        assert_eq!(runs.get(), 3);

        // Asking for reactive on a readonly wrapper returns it unchanged
        let again = Observable::reactive(ro.clone()).unwrap();
        assert!(again.ptr_eq(&ro));
    }

    #[test]
    fn writes_store_raw_values() {
        let parent = state(json!({}));
        let child = state(json!({"x": 1}));
        parent.set("child", child.clone()).unwrap();

        assert!(matches!(parent.raw().get("child"), Some(Value::Container(c)) if c.ptr_eq(child.raw())));
        // Read back through the same wrapper
        assert!(parent.get("child").as_observable().unwrap().ptr_eq(&child));
    }

    #[test]
    fn unchanged_write_does_not_trigger() {
        let s = Observable::reactive(Container::from_object([
            ("a", Value::from(1)),
            ("n", Value::from(f64::NAN)),
        ]))
        .unwrap();
        let runs = Rc::new(Cell::new(0));
        let (s_clone, runs_clone) = (s.clone(), runs.clone());
        let _runner = effect(move || {
            s_clone.get("a");
            s_clone.get("n");
            runs_clone.set(runs_clone.get() + 1);
        });

        s.set("a", 1).unwrap();
        s.set("n", f64::NAN).unwrap();
        assert_eq!(runs.get(), 1);

        s.set("a", 2).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn adding_and_deleting_keys_notifies_iteration() {
        let s = state(json!({"a": 1}));
        let seen = Rc::new(Cell::new(0));
        let (s_clone, seen_clone) = (s.clone(), seen.clone());
        let _runner = effect(move || seen_clone.set(s_clone.keys().len()));
        assert_eq!(seen.get(), 1);

        s.set("b", 2).unwrap();
        assert_eq!(seen.get(), 2);

        // Changing a value does not change the key set
        s.set("b", 3).unwrap();
        assert!(s.delete("a").unwrap());
        assert_eq!(seen.get(), 1);
        assert!(!s.delete("a").unwrap());
    }

    #[test]
    fn has_tracks_membership() {
        let s = state(json!({}));
        let present = Rc::new(Cell::new(false));
        let (s_clone, present_clone) = (s.clone(), present.clone());
        let _runner = effect(move || present_clone.set(s_clone.has("a")));

        s.set("a", 1).unwrap();
        assert!(present.get());
    }

    #[test]
    fn map_clear_notifies_every_reader() {
        let map = Observable::reactive(Container::from_map([("a", 1), ("b", 2)])).unwrap();
        let runs = Rc::new(Cell::new(0));
        let (map_clone, runs_clone) = (map.clone(), runs.clone());
        let _runner = effect(move || {
            map_clone.get("a");
            runs_clone.set(runs_clone.get() + 1);
        });

        map.clear().unwrap();
        assert_eq!(runs.get(), 2);
        assert!(map.is_empty());

        // Clearing an empty map is not a change
        map.clear().unwrap();
        assert_eq!(runs.get(), 2);

        let obj = state(json!({}));
        assert!(matches!(obj.clear(), Err(ReactiveError::UnsupportedOperation { .. })));
    }

    #[test]
    fn map_value_change_notifies_value_iteration_but_not_key_iteration() {
        let map = Observable::reactive(Container::from_map([("a", 1)])).unwrap();
        let (key_runs, value_runs) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));

        let (map_clone, key_runs_clone) = (map.clone(), key_runs.clone());
        let _keys = effect(move || {
            map_clone.keys();
            key_runs_clone.set(key_runs_clone.get() + 1);
        });
        let (map_clone, value_runs_clone) = (map.clone(), value_runs.clone());
        let _values = effect(move || {
            map_clone.values();
            value_runs_clone.set(value_runs_clone.get() + 1);
        });

        map.set("a", 2).unwrap();
        assert_eq!((key_runs.get(), value_runs.get()), (1, 2));

        map.set("b", 1).unwrap();
        assert_eq!((key_runs.get(), value_runs.get()), (2, 3));
    }
}
