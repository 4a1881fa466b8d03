//! Typed Value Store
//!
//! A single map from key to [`Entry`]. The store has exactly one owner (the
//! command executor), so every operation takes `&mut self` and there are no
//! locks: an operation runs from start to finish before any other command
//! can observe the map.
//!
//! ## Rules every operation follows
//!
//! 1. **Lazy eviction first.** A keyed operation removes the entry when its
//!    deadline has passed, then proceeds as if the key never existed.
//! 2. **Type check before mutation.** Using a key as the wrong variant yields
//!    [`StorageError::WrongType`] and leaves the entry untouched.
//! 3. **Overwrites reset the lifetime.** `set` without a TTL and `mset`
//!    replace the whole entry, dropping any old deadline. In-place updates
//!    (`incr`, pushes, pops, `sadd`, `hset`) keep the entry's deadline.
//! 4. **Empty containers stay.** Popping the last element of a list or set
//!    leaves an empty container under the key.

use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::trace;

use crate::storage::expiry::{self, Expiry};
use crate::storage::value::{Entry, Value};

/// Errors raised by typed store operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The key holds a different variant than the operation requires
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// A counter is not a decimal i64 or would overflow
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// `NX` / `XX` write condition for [`StorageEngine::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    /// Only write when the key is absent
    Nx,
    /// Only write when the key is present
    Xx,
}

/// Parsed `SET` options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub expiry: Option<Expiry>,
    pub condition: Option<SetCondition>,
}

/// Remaining lifetime of a key as seen by `TTL` / `PTTL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    Persistent,
    Expires(Duration),
}

/// Store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Entries currently in the map, including expired ones nobody has touched yet
    pub keys: u64,
    /// Entries removed by lazy eviction
    pub expired: u64,
}

/// The typed key-value store.
///
/// # Example
///
/// ```
/// use nimbuskv::storage::{SetOptions, StorageEngine};
/// use bytes::Bytes;
///
/// let mut store = StorageEngine::new();
/// store.set(Bytes::from("name"), Bytes::from("nimbus"), SetOptions::default());
/// assert_eq!(store.get(b"name"), Ok(Some(Bytes::from("nimbus"))));
///
/// store.lpush(Bytes::from("queue"), vec![Bytes::from("a"), Bytes::from("b")]).unwrap();
/// assert!(store.get(b"queue").is_err());
/// ```
#[derive(Debug, Default)]
pub struct StorageEngine {
    entries: HashMap<Bytes, Entry>,
    expired: u64,
}

impl StorageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes `key` if its deadline has passed. Returns true when it did.
    fn evict_if_expired(&mut self, key: &[u8]) -> bool {
        let now = Instant::now();
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired_at(now));

        if expired {
            self.entries.remove(key);
            self.expired += 1;
            trace!(key = %String::from_utf8_lossy(key), "Evicted expired key");
        }

        expired
    }

    fn live(&mut self, key: &[u8]) -> Option<&Entry> {
        self.evict_if_expired(key);
        self.entries.get(key)
    }

    fn live_mut(&mut self, key: &[u8]) -> Option<&mut Entry> {
        self.evict_if_expired(key);
        self.entries.get_mut(key)
    }

    /// Returns the live entry for `key`, inserting `empty()` when absent.
    ///
    /// Nothing is inserted when the key already exists, whatever its variant,
    /// so a subsequent type mismatch leaves the store unchanged.
    fn entry_or_insert(&mut self, key: Bytes, empty: fn() -> Value) -> &mut Entry {
        self.evict_if_expired(&key);
        self.entries
            .entry(key)
            .or_insert_with(|| Entry::new(empty()))
    }

    fn list_mut(&mut self, key: &[u8]) -> StorageResult<Option<&mut VecDeque<Bytes>>> {
        match self.live_mut(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(Some(list)),
            Some(_) => Err(StorageError::WrongType),
        }
    }

    fn set_mut(&mut self, key: &[u8]) -> StorageResult<Option<&mut HashSet<Bytes>>> {
        match self.live_mut(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(Some(set)),
            Some(_) => Err(StorageError::WrongType),
        }
    }

    // ========================================================================
    // STRING OPERATIONS
    // ========================================================================

    /// Writes a string value, subject to `NX`/`XX`.
    ///
    /// Replaces whatever the key held before, of any variant. The new deadline
    /// comes from `options.expiry`; without one the key becomes persistent.
    ///
    /// # Returns
    ///
    /// `false` when the condition prevented the write.
    pub fn set(&mut self, key: Bytes, value: Bytes, options: SetOptions) -> bool {
        let exists = self.live(&key).is_some();

        match options.condition {
            Some(SetCondition::Nx) if exists => return false,
            Some(SetCondition::Xx) if !exists => return false,
            _ => {}
        }

        let expires_at = options
            .expiry
            .and_then(|ttl| ttl.deadline_from(Instant::now()));
        self.entries
            .insert(key, Entry::with_deadline(Value::String(value), expires_at));
        true
    }

    /// Reads a string value. `Ok(None)` when absent.
    pub fn get(&mut self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        match self.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::String(data),
                ..
            }) => Ok(Some(data.clone())),
            Some(_) => Err(StorageError::WrongType),
        }
    }

    /// Adds one to a decimal counter, treating an absent key as `0`.
    ///
    /// The stored bytes are replaced by the new decimal representation; a
    /// failed parse leaves them exactly as they were.
    pub fn incr(&mut self, key: Bytes) -> StorageResult<i64> {
        match self.live_mut(&key) {
            Some(entry) => {
                let Value::String(data) = &mut entry.value else {
                    return Err(StorageError::WrongType);
                };
                let next = parse_i64(data)
                    .and_then(|n| n.checked_add(1))
                    .ok_or(StorageError::NotAnInteger)?;
                *data = Bytes::from(next.to_string());
                Ok(next)
            }
            None => {
                self.entries
                    .insert(key, Entry::new(Value::String(Bytes::from_static(b"1"))));
                Ok(1)
            }
        }
    }

    /// Unconditionally writes every pair, clearing any deadlines.
    pub fn mset(&mut self, pairs: Vec<(Bytes, Bytes)>) {
        for (key, value) in pairs {
            self.entries.insert(key, Entry::new(Value::String(value)));
        }
    }

    // ========================================================================
    // LIST OPERATIONS
    // ========================================================================

    /// Pushes each value to the head in argument order, so
    /// `LPUSH key a b c` leaves `[c, b, a]`.
    ///
    /// # Returns
    /// The length of the list after the push.
    pub fn lpush(&mut self, key: Bytes, values: Vec<Bytes>) -> StorageResult<usize> {
        let Value::List(list) = &mut self.entry_or_insert(key, empty_list).value else {
            return Err(StorageError::WrongType);
        };
        for value in values {
            list.push_front(value);
        }
        Ok(list.len())
    }

    /// Appends each value to the tail in argument order.
    pub fn rpush(&mut self, key: Bytes, values: Vec<Bytes>) -> StorageResult<usize> {
        let Value::List(list) = &mut self.entry_or_insert(key, empty_list).value else {
            return Err(StorageError::WrongType);
        };
        list.extend(values);
        Ok(list.len())
    }

    /// Removes and returns the head element. The key survives an emptied list.
    pub fn lpop(&mut self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        Ok(self.list_mut(key)?.and_then(|list| list.pop_front()))
    }

    /// Removes and returns the tail element. The key survives an emptied list.
    pub fn rpop(&mut self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        Ok(self.list_mut(key)?.and_then(|list| list.pop_back()))
    }

    /// Returns elements `start..=stop`. Both bounds are inclusive and negative
    /// indices count from the tail (`-1` is the last element).
    ///
    /// # Returns
    /// `Ok(None)` when the key is absent, an empty vector when the range
    /// selects nothing.
    pub fn lrange(&mut self, key: &[u8], start: i64, stop: i64) -> StorageResult<Option<Vec<Bytes>>> {
        let list = match self.live(key) {
            None => return Ok(None),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => list,
            Some(_) => return Err(StorageError::WrongType),
        };

        let items = match inclusive_range(list.len(), start, stop) {
            Some((from, to)) => list.range(from..=to).cloned().collect(),
            None => Vec::new(),
        };
        Ok(Some(items))
    }

    // ========================================================================
    // SET OPERATIONS
    // ========================================================================

    /// Adds members to a set.
    ///
    /// # Returns
    /// How many of `members` were not already present.
    pub fn sadd(&mut self, key: Bytes, members: Vec<Bytes>) -> StorageResult<usize> {
        let Value::Set(set) = &mut self.entry_or_insert(key, empty_set).value else {
            return Err(StorageError::WrongType);
        };
        let mut added = 0;
        for member in members {
            if set.insert(member) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Removes and returns an arbitrary member. The key survives an emptied set.
    pub fn spop(&mut self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        let Some(set) = self.set_mut(key)? else {
            return Ok(None);
        };
        let member = set.iter().next().cloned();
        if let Some(member) = &member {
            set.remove(member);
        }
        Ok(member)
    }

    // ========================================================================
    // HASH OPERATIONS
    // ========================================================================

    /// Writes fields into a hash.
    ///
    /// # Returns
    /// How many fields were newly created (updates of existing fields count 0).
    pub fn hset(&mut self, key: Bytes, pairs: Vec<(Bytes, Bytes)>) -> StorageResult<usize> {
        let Value::Hash(hash) = &mut self.entry_or_insert(key, empty_hash).value else {
            return Err(StorageError::WrongType);
        };
        let mut created = 0;
        for (field, value) in pairs {
            if hash.insert(field, value).is_none() {
                created += 1;
            }
        }
        Ok(created)
    }

    // ========================================================================
    // KEY OPERATIONS
    // ========================================================================

    /// Deletes keys, returning how many live keys were removed.
    pub fn delete(&mut self, keys: &[Bytes]) -> usize {
        let mut deleted = 0;
        for key in keys {
            if !self.evict_if_expired(key) && self.entries.remove(key).is_some() {
                deleted += 1;
            }
        }
        deleted
    }

    /// Counts live keys. A key named twice is counted twice.
    pub fn exists(&mut self, keys: &[Bytes]) -> usize {
        keys.iter().filter(|key| self.live(key).is_some()).count()
    }

    /// Type name of the live value, if any.
    pub fn key_type(&mut self, key: &[u8]) -> Option<&'static str> {
        self.live(key).map(|entry| entry.value.type_name())
    }

    pub fn ttl(&mut self, key: &[u8]) -> KeyTtl {
        let now = Instant::now();
        match self.live(key) {
            None => KeyTtl::Missing,
            Some(entry) => match expiry::remaining(entry.expires_at, now) {
                None => KeyTtl::Persistent,
                Some(left) => KeyTtl::Expires(left),
            },
        }
    }

    /// Number of entries in the map, expired-but-untouched ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn flush(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.entries.len() as u64,
            expired: self.expired,
        }
    }
}

fn empty_list() -> Value {
    Value::List(VecDeque::new())
}

fn empty_set() -> Value {
    Value::Set(HashSet::new())
}

fn empty_hash() -> Value {
    Value::Hash(HashMap::new())
}

/// Parses a strict decimal i64 (optional leading `-`, no whitespace).
pub(crate) fn parse_i64(raw: &[u8]) -> Option<i64> {
    let digits = raw.strip_prefix(b"-").unwrap_or(raw);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(raw).ok()?.parse().ok()
}

/// Resolves `start..=stop` against a list of `len` elements.
///
/// Negative indices are offsets from the tail. The result is clamped to the
/// list; `None` means the range is empty.
fn inclusive_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}
