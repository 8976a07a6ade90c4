//! State containers.
//!
//! A container is the raw, untracked storage behind a wrapper: an object with
//! named fields, a dense array, or a keyed map. Reads and writes on a
//! `Container` itself are never tracked and never notify anyone; go through
//! an [`Observable`](super::Observable) for that.
//!
//! Every container gets a fresh [`TargetId`] on creation. Per-field deps are
//! registered under that id, and dropping the last handle to the container
//! releases them.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::value::Value;
use crate::error::{ReactiveError, Result};
use crate::reactive::{try_with_runtime, Key, TargetId, TargetKind};

/// Storage of one container.
pub(crate) enum Body {
    Object(IndexMap<Rc<str>, Value>),
    Array(Vec<Value>),
    Map(IndexMap<Rc<str>, Value>),
}

impl Body {
    fn kind(&self) -> TargetKind {
        match self {
            Body::Object(_) => TargetKind::Object,
            Body::Array(_) => TargetKind::Array,
            Body::Map(_) => TargetKind::Map,
        }
    }

    fn len(&self) -> usize {
        match self {
            Body::Object(fields) | Body::Map(fields) => fields.len(),
            Body::Array(items) => items.len(),
        }
    }
}

struct ContainerData {
    id: TargetId,
    body: RefCell<Body>,
    frozen: Cell<bool>,
    skip: Cell<bool>,
}

impl Drop for ContainerData {
    fn drop(&mut self) {
        try_with_runtime(|rt| rt.dispose_target(self.id));
    }
}

/// Shared handle to a raw container. Clones alias the same storage.
#[derive(Clone)]
pub struct Container(Rc<ContainerData>);

impl Container {
    fn with_body(body: Body) -> Self {
        Self(Rc::new(ContainerData {
            id: TargetId::next(),
            body: RefCell::new(body),
            frozen: Cell::new(false),
            skip: Cell::new(false),
        }))
    }

    /// Create an empty object.
    pub fn object() -> Self {
        Self::with_body(Body::Object(IndexMap::new()))
    }

    /// Create an empty array.
    pub fn array() -> Self {
        Self::with_body(Body::Array(Vec::new()))
    }

    /// Create an empty map.
    pub fn map() -> Self {
        Self::with_body(Body::Map(IndexMap::new()))
    }

    pub fn from_object<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self::with_body(Body::Object(fields))
    }

    pub fn from_array<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::with_body(Body::Array(items.into_iter().map(Into::into).collect()))
    }

    pub fn from_map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        let entries = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self::with_body(Body::Map(entries))
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }

    pub fn kind(&self) -> TargetKind {
        self.0.body.borrow().kind()
    }

    pub fn ptr_eq(&self, other: &Container) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn len(&self) -> usize {
        self.0.body.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the container immutable. Frozen containers reject writes and are
    /// never wrapped.
    pub fn freeze(&self) {
        self.0.frozen.set(true);
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.get()
    }

    pub(crate) fn mark_skip(&self) {
        self.0.skip.set(true);
    }

    /// Whether the container was marked raw and must never be wrapped.
    pub fn is_skipped(&self) -> bool {
        self.0.skip.get()
    }

    pub(crate) fn body(&self) -> Ref<'_, Body> {
        self.0.body.borrow()
    }

    /// Mutable access for writers. Fails on frozen containers.
    pub(crate) fn body_mut(&self, key: &Key) -> Result<RefMut<'_, Body>> {
        if self.is_frozen() {
            return Err(ReactiveError::ReadonlyTarget { key: key.to_string() });
        }
        Ok(self.0.body.borrow_mut())
    }

    /// Read a field.
    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        let key = key.into().normalize(self.kind());
        self.lookup(&key)
    }

    pub(crate) fn lookup(&self, key: &Key) -> Option<Value> {
        match (&*self.body(), key) {
            (Body::Object(fields) | Body::Map(fields), Key::Field(name)) => fields.get(name).cloned(),
            (Body::Array(items), Key::Index(index)) => items.get(*index).cloned(),
            (Body::Array(items), Key::Length) => Some(Value::from(items.len())),
            _ => None,
        }
    }

    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into().normalize(self.kind());
        self.contains(&key)
    }

    pub(crate) fn contains(&self, key: &Key) -> bool {
        match (&*self.body(), key) {
            (Body::Object(fields) | Body::Map(fields), Key::Field(name)) => fields.contains_key(name),
            (Body::Array(items), Key::Index(index)) => *index < items.len(),
            (Body::Array(_), Key::Length) => true,
            _ => false,
        }
    }

    /// Write a field, returning the previous value.
    ///
    /// Writing past the end of an array pads it with `Null`. Fails with
    /// [`ReactiveError::CapacityExceeded`] if the storage cannot grow that far.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<Option<Value>> {
        let key = key.into().normalize(self.kind());
        self.insert(key, value.into())
    }

    pub(crate) fn insert(&self, key: Key, value: Value) -> Result<Option<Value>> {
        let kind = self.kind();
        let mut body = self.body_mut(&key)?;
        match (&mut *body, key) {
            (Body::Object(fields) | Body::Map(fields), Key::Field(name)) => Ok(fields.insert(name, value)),
            (Body::Array(items), Key::Index(index)) => {
                if index < items.len() {
                    Ok(Some(std::mem::replace(&mut items[index], value)))
                } else {
                    grow(items, index + 1)?;
                    items.resize(index, Value::Null);
                    items.push(value);
                    Ok(None)
                }
            }
            (Body::Array(_), Key::Length) => Err(ReactiveError::UnsupportedOperation {
                op: "length write through set (use set_len)",
                kind,
            }),
            (_, key) => Err(ReactiveError::UnsupportedOperation {
                op: unsupported_key_op(&key),
                kind,
            }),
        }
    }

    /// Remove a field, returning its value.
    ///
    /// Deleting an array element leaves a `Null` hole and keeps the length.
    /// The hole is still a present index: `has` reports it, and a later
    /// write to it is an update, not an addition.
    pub fn delete(&self, key: impl Into<Key>) -> Result<Option<Value>> {
        let key = key.into().normalize(self.kind());
        self.remove(&key)
    }

    pub(crate) fn remove(&self, key: &Key) -> Result<Option<Value>> {
        let mut body = self.body_mut(key)?;
        Ok(match (&mut *body, key) {
            (Body::Object(fields) | Body::Map(fields), Key::Field(name)) => fields.shift_remove(name),
            (Body::Array(items), Key::Index(index)) => items
                .get_mut(*index)
                .map(|slot| std::mem::replace(slot, Value::Null)),
            _ => None,
        })
    }

    /// Own keys in insertion order: field names, or indices for arrays.
    pub fn keys(&self) -> Vec<Key> {
        match &*self.body() {
            Body::Object(fields) | Body::Map(fields) => {
                fields.keys().map(|name| Key::Field(Rc::clone(name))).collect()
            }
            Body::Array(items) => (0..items.len()).map(Key::Index).collect(),
        }
    }

    pub fn values(&self) -> Vec<Value> {
        match &*self.body() {
            Body::Object(fields) | Body::Map(fields) => fields.values().cloned().collect(),
            Body::Array(items) => items.clone(),
        }
    }

    /// Remove every entry, returning the removed values.
    pub(crate) fn take_all(&self) -> Result<Vec<Value>> {
        let mut body = self.body_mut(&Key::Iterate)?;
        Ok(match &mut *body {
            Body::Object(fields) | Body::Map(fields) => fields.drain(..).map(|(_, v)| v).collect(),
            Body::Array(items) => std::mem::take(items),
        })
    }

    /// Run `f` on the array items. `None` if this is not an array.
    pub(crate) fn with_array<R>(&self, f: impl FnOnce(&[Value]) -> R) -> Option<R> {
        match &*self.body() {
            Body::Array(items) => Some(f(items)),
            _ => None,
        }
    }

    /// Run `f` on the array storage.
    pub(crate) fn with_array_mut<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R> {
        let kind = self.kind();
        let mut body = self.body_mut(&Key::Length)?;
        match &mut *body {
            Body::Array(items) => Ok(f(items)),
            _ => Err(ReactiveError::UnsupportedOperation { op: "array mutation", kind }),
        }
    }
}

/// Reserve room for `len` items without aborting on allocation failure.
pub(crate) fn grow(items: &mut Vec<Value>, len: usize) -> Result<()> {
    let additional = len.saturating_sub(items.len());
    items
        .try_reserve(additional)
        .map_err(|_| ReactiveError::CapacityExceeded { len })
}

fn unsupported_key_op(key: &Key) -> &'static str {
    match key {
        Key::Field(_) => "named field",
        Key::Index(_) => "index",
        Key::Length => "length",
        Key::Iterate | Key::MapKeyIterate => "reserved key",
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Shallow on purpose: containers may hold themselves.
        f.debug_struct("Container")
            .field("id", &self.id().raw())
            .field("kind", &self.kind())
            .field("len", &self.len())
            .finish()
    }
}

impl Serialize for Container {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &*self.body() {
            Body::Object(fields) | Body::Map(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(&**name, value)?;
                }
                map.end()
            }
            Body::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}
