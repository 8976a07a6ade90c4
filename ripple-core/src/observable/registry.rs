//! Wrapper registry.
//!
//! Maps each `(container, mode, source mode)` triple to the wrapper already
//! built for it, so wrapping the same container twice yields the same
//! wrapper. The source mode is set for readonly views of a reactive
//! wrapper. Entries hold weak references and are removed when the wrapper
//! is dropped.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::proxy::{Mode, ObservableInner};
use crate::reactive::TargetId;

pub(crate) type RegistryKey = (TargetId, Mode, Option<Mode>);

thread_local! {
    static REGISTRY: RefCell<HashMap<RegistryKey, Weak<ObservableInner>>> = RefCell::new(HashMap::new());
}

/// The live wrapper for `key`, if any.
pub(crate) fn lookup(key: RegistryKey) -> Option<Rc<ObservableInner>> {
    REGISTRY.with(|registry| registry.borrow().get(&key).and_then(Weak::upgrade))
}

pub(crate) fn register(key: RegistryKey, inner: &Rc<ObservableInner>) {
    let stale = REGISTRY.with(|registry| registry.borrow_mut().insert(key, Rc::downgrade(inner)));
    drop(stale);
}

/// Remove the entry for `key` if its wrapper is gone.
pub(crate) fn unregister(key: RegistryKey) {
    let _ = REGISTRY.try_with(|registry| {
        if let Ok(mut registry) = registry.try_borrow_mut() {
            if registry.get(&key).is_some_and(|weak| weak.strong_count() == 0) {
                registry.remove(&key);
            }
        }
    });
}

/// Number of live entries. Used by tests.
#[cfg(test)]
pub(crate) fn len() -> usize {
    REGISTRY.with(|registry| registry.borrow().len())
}
