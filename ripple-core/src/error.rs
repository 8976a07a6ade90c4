//! Error types.

use thiserror::Error;

use crate::reactive::TargetKind;

/// Errors returned by writes and container operations.
///
/// Reads never fail. A rejected write leaves all state untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactiveError {
    #[error("computed value is readonly")]
    ReadonlyComputed,

    #[error("set operation on key \"{key}\" failed: target is readonly")]
    ReadonlyTarget { key: String },

    #[error("key \"{key}\" is reserved for wrapper flags")]
    ReservedKey { key: String },

    #[error("{op} is not supported on {kind} targets")]
    UnsupportedOperation { op: &'static str, kind: TargetKind },

    #[error("invalid array length: {0}")]
    InvalidLength(f64),

    #[error("cannot grow array to {len} elements")]
    CapacityExceeded { len: usize },

    #[error("expected {expected}, found {found}")]
    Type {
        expected: &'static str,
        found: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, ReactiveError>;
