//! Typed values and store entries.

use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use crate::storage::expiry;

/// A stored value. The variant is fixed for the lifetime of the entry; only
/// an overwrite (`SET`, `MSET`) can replace it with a different one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(Bytes),
    /// Double-ended so pushes and pops are O(1) at both ends
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
}

impl Value {
    /// Name reported by `TYPE`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Hash(_) => "hash",
        }
    }
}

/// A value plus its optional absolute deadline. Eviction and overwrite are
/// a single map operation.
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Value,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl Entry {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    pub fn with_deadline(value: Value, expires_at: Option<Instant>) -> Self {
        Self { value, expires_at }
    }

    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        expiry::is_expired(self.expires_at, now)
    }
}
