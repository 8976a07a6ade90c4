//! Vocabulary shared by the track and trigger entry points.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::EffectId;

/// Largest array length. Index keys at or above it address named fields.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// Identity of a state container.
///
/// Allocated from a monotonic counter rather than derived from an address,
/// so an id is never reused by a later container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Shape of a state container. Decides which extra deps a trigger touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Plain object with string fields.
    Object,
    /// Dense array with index fields and a length.
    Array,
    /// Keyed collection supporting `clear`.
    Map,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetKind::Object => "object",
            TargetKind::Array => "array",
            TargetKind::Map => "map",
        })
    }
}

/// One observable slot of a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Named field of an object or map entry.
    Field(Rc<str>),
    /// Array element.
    Index(usize),
    /// Array length.
    Length,
    /// Reserved slot notified when the container's key set changes.
    Iterate,
    /// Reserved slot notified when a map's key set changes.
    MapKeyIterate,
}

impl Key {
    /// Coerce the key to the form used by containers of `kind`.
    ///
    /// Arrays address `"length"` and canonical integer strings below
    /// [`MAX_ARRAY_LENGTH`] as [`Key::Length`] and [`Key::Index`]; objects
    /// and maps address indices by their decimal name.
    pub fn normalize(self, kind: TargetKind) -> Key {
        match (kind, self) {
            (TargetKind::Array, Key::Index(index)) if index >= MAX_ARRAY_LENGTH => {
                Key::Field(Rc::from(index.to_string()))
            }
            (TargetKind::Array, Key::Field(name)) => {
                if &*name == "length" {
                    Key::Length
                } else if let Some(index) = integer_key(&name) {
                    Key::Index(index)
                } else {
                    Key::Field(name)
                }
            }
            (TargetKind::Object | TargetKind::Map, Key::Index(index)) => {
                Key::Field(Rc::from(index.to_string()))
            }
            (_, key) => key,
        }
    }

    /// The field name, if this key names a field.
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Key::Field(name) => Some(name),
            _ => None,
        }
    }
}

fn integer_key(name: &str) -> Option<usize> {
    let index: usize = name.parse().ok()?;
    (index < MAX_ARRAY_LENGTH && index.to_string() == name).then_some(index)
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Field(Rc::from(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Field(Rc::from(name))
    }
}

impl From<Rc<str>> for Key {
    fn from(name: Rc<str>) -> Self {
        Key::Field(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<i32> for Key {
    fn from(index: i32) -> Self {
        match usize::try_from(index) {
            Ok(index) => Key::Index(index),
            Err(_) => Key::from(index.to_string()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
            Key::Length => f.write_str("length"),
            Key::Iterate => f.write_str("<iterate>"),
            Key::MapKeyIterate => f.write_str("<map-key-iterate>"),
        }
    }
}

/// Kind of read being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// A write, described by what it changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOp {
    /// An existing key got a different value.
    Set(Key),
    /// A key that did not exist before was added.
    Add(Key),
    /// An existing key was removed.
    Delete(Key),
    /// Every entry of a collection was removed.
    Clear,
    /// Array elements from `from` onward moved or were truncated.
    Reindex { from: usize, length_changed: bool },
}

impl TriggerOp {
    pub fn key(&self) -> Option<&Key> {
        match self {
            TriggerOp::Set(key) | TriggerOp::Add(key) | TriggerOp::Delete(key) => Some(key),
            TriggerOp::Clear | TriggerOp::Reindex { .. } => None,
        }
    }
}

/// Whether a debugger event came from a read or a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOp {
    Track(TrackOp),
    Trigger(TriggerOp),
}

/// Passed to an effect's `on_track` / `on_trigger` hooks.
///
/// For deps owned by a signal or computed, `target` is `None` and `key` is
/// `"value"`.
#[derive(Debug, Clone)]
pub struct DebuggerEvent {
    pub effect: EffectId,
    pub target: Option<TargetId>,
    pub key: Option<Key>,
    pub op: DebugOp,
}
