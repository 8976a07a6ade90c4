//! Array operations on wrappers.
//!
//! Two groups need more than plain field interception:
//!
//! - Identity searches (`includes`, `index_of`, `last_index_of`) depend on
//!   every element, so they track the length and every index. When the
//!   needle is a wrapper and the first search misses, the search is retried
//!   with the needle's raw container, since the array stores raw values.
//!
//! - Length-changing mutations (`push`, `pop`, `shift`, `unshift`,
//!   `splice`, `set_len`) run with tracking paused and notify once, through
//!   a single reindex trigger covering every moved index and the length.

use super::container::grow;
use super::proxy::Observable;
use super::value::Value;
use super::to_raw;
use crate::error::{ReactiveError, Result};
use crate::reactive::{Key, TargetKind, TrackOp, TrackingPause, TriggerOp, MAX_ARRAY_LENGTH};

impl Observable {
    fn require_array(&self, op: &'static str) -> Result<()> {
        match self.kind() {
            TargetKind::Array => Ok(()),
            kind => Err(ReactiveError::UnsupportedOperation { op, kind }),
        }
    }

    fn require_writable_array(&self, op: &'static str) -> Result<()> {
        self.require_array(op)?;
        if self.is_readonly() {
            return Err(self.reject_write(&Key::Length));
        }
        Ok(())
    }

    fn track_all_indices(&self) {
        let len = self.raw().len();
        self.track(TrackOp::Get, Key::Length);
        for index in 0..len {
            self.track(TrackOp::Get, Key::Index(index));
        }
    }

    /// Search with `find`, retrying with the needle's raw container on a miss.
    fn search(
        &self,
        op: &'static str,
        needle: &Value,
        find: impl Fn(&[Value], &Value) -> Option<usize>,
    ) -> Result<Option<usize>> {
        self.require_array(op)?;
        self.track_all_indices();

        let found = self.raw().with_array(|items| find(items, needle)).flatten();
        if found.is_some() || !matches!(needle, Value::Observable(_)) {
            return Ok(found);
        }
        let raw_needle = to_raw(needle);
        Ok(self.raw().with_array(|items| find(items, &raw_needle)).flatten())
    }

    /// Whether the array contains `needle` (SameValueZero).
    pub fn includes(&self, needle: &Value) -> Result<bool> {
        let found = self.search("includes", needle, |items, needle| {
            items.iter().position(|item| item.same_value_zero(needle))
        })?;
        Ok(found.is_some())
    }

    /// First index holding `needle` (strict equality).
    pub fn index_of(&self, needle: &Value) -> Result<Option<usize>> {
        self.search("index_of", needle, |items, needle| {
            items.iter().position(|item| item.strict_eq(needle))
        })
    }

    /// Last index holding `needle` (strict equality).
    pub fn last_index_of(&self, needle: &Value) -> Result<Option<usize>> {
        self.search("last_index_of", needle, |items, needle| {
            items.iter().rposition(|item| item.strict_eq(needle))
        })
    }

    /// Append values, returning the new length.
    pub fn push<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Result<usize> {
        self.require_writable_array("push")?;
        let _pause = TrackingPause::new();

        let values: Vec<Value> = values
            .into_iter()
            .map(|value| self.unwrap_incoming(value.into()))
            .collect();
        let added = values.len();
        let (old_len, new_len) = self.raw().with_array_mut(|items| {
            let old_len = items.len();
            items.extend(values);
            (old_len, items.len())
        })?;

        if added > 0 {
            self.trigger(TriggerOp::Reindex {
                from: old_len,
                length_changed: true,
            });
        }
        Ok(new_len)
    }

    /// Remove and return the last element (`Null` if empty).
    pub fn pop(&self) -> Result<Value> {
        self.require_writable_array("pop")?;
        let _pause = TrackingPause::new();

        let (popped, new_len) = self.raw().with_array_mut(|items| (items.pop(), items.len()))?;
        let Some(popped) = popped else {
            return Ok(Value::Null);
        };
        self.trigger(TriggerOp::Reindex {
            from: new_len,
            length_changed: true,
        });
        Ok(self.wrap_child(popped))
    }

    /// Remove and return the first element (`Null` if empty).
    pub fn shift(&self) -> Result<Value> {
        self.require_writable_array("shift")?;
        let _pause = TrackingPause::new();

        let shifted = self
            .raw()
            .with_array_mut(|items| (!items.is_empty()).then(|| items.remove(0)))?;
        let Some(shifted) = shifted else {
            return Ok(Value::Null);
        };
        self.trigger(TriggerOp::Reindex {
            from: 0,
            length_changed: true,
        });
        Ok(self.wrap_child(shifted))
    }

    /// Prepend values, returning the new length.
    pub fn unshift<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Result<usize> {
        self.require_writable_array("unshift")?;
        let _pause = TrackingPause::new();

        let values: Vec<Value> = values
            .into_iter()
            .map(|value| self.unwrap_incoming(value.into()))
            .collect();
        let added = values.len();
        let new_len = self.raw().with_array_mut(|items| {
            items.splice(0..0, values);
            items.len()
        })?;

        if added > 0 {
            self.trigger(TriggerOp::Reindex {
                from: 0,
                length_changed: true,
            });
        }
        Ok(new_len)
    }

    /// Remove `delete_count` elements at `start` and insert `values` there.
    ///
    /// `start` and `delete_count` are clamped to the array. Returns the
    /// removed elements.
    pub fn splice<V: Into<Value>>(
        &self,
        start: usize,
        delete_count: usize,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Vec<Value>> {
        self.require_writable_array("splice")?;
        let _pause = TrackingPause::new();

        let values: Vec<Value> = values
            .into_iter()
            .map(|value| self.unwrap_incoming(value.into()))
            .collect();
        let inserted = values.len();
        let (start, removed) = self.raw().with_array_mut(|items| {
            let start = start.min(items.len());
            let end = start + delete_count.min(items.len() - start);
            let removed: Vec<Value> = items.splice(start..end, values).collect();
            (start, removed)
        })?;

        if !removed.is_empty() || inserted > 0 {
            self.trigger(TriggerOp::Reindex {
                from: start,
                length_changed: removed.len() != inserted,
            });
        }
        Ok(removed.into_iter().map(|value| self.wrap_child(value)).collect())
    }

    /// Truncate or extend (with `Null`) the array to `len`.
    pub fn set_len(&self, len: usize) -> Result<()> {
        self.require_writable_array("set_len")?;
        if len > MAX_ARRAY_LENGTH {
            return Err(ReactiveError::InvalidLength(len as f64));
        }
        let _pause = TrackingPause::new();

        let (old_len, truncated) = self.raw().with_array_mut(|items| -> Result<_> {
            let old_len = items.len();
            let truncated = if len < old_len {
                items.split_off(len)
            } else {
                grow(items, len)?;
                items.resize(len, Value::Null);
                Vec::new()
            };
            Ok((old_len, truncated))
        })??;

        if old_len != len {
            self.trigger(TriggerOp::Reindex {
                from: len,
                length_changed: true,
            });
        }
        drop(truncated);
        Ok(())
    }
}
