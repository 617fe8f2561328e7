//! Thread-Safe Storage Engine
//!
//! This module implements the keyspace behind memkv: one flat map from key to
//! a typed value (blob, list or set) plus a reverse index from set member to
//! the keys of every set that contains it.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     StorageEngine                        │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │                RwLock<Keyspace>                    │  │
//! │  │  ┌────────────────────┐   ┌──────────────────────┐ │  │
//! │  │  │ entries            │   │ members              │ │  │
//! │  │  │ key -> Value       │   │ member -> {set keys} │ │  │
//! │  │  └────────────────────┘   └──────────────────────┘ │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Both maps live behind the same lock. A set mutation and its reverse-index
//! update therefore happen in one critical section, multi-key reads such as
//! `set_intersect` see a single snapshot, and `flush_all` clears everything
//! with no other operation in flight.
//!
//! ## Type Rules
//!
//! - Reads against a key of another type return the empty/absent result,
//!   never an error (`blob_get` on a set is `None`).
//! - Writes claim the key: `blob_set`, `incr_by`, `list_append` and `set_add`
//!   replace a value of another type (dropping a set's index entries first).
//! - Removals (`list_remove`, `set_remove`) against another type are no-ops.

use crate::storage::pattern::KeyPattern;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Failures reported by the storage engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The stored blob is not a base-10 signed 64-bit integer
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// The increment would leave the i64 range
    #[error("increment or decrement would overflow")]
    Overflow,

    /// A worker panicked while holding the keyspace lock
    #[error("keyspace lock poisoned")]
    Poisoned,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A typed value stored under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Arbitrary bytes, also usable as a decimal counter
    Blob(Bytes),
    /// Ordered, duplicate-permitting sequence, appended at the tail
    List(VecDeque<Bytes>),
    /// Unordered unique members
    Set(HashSet<Bytes>),
}

impl Value {
    /// The Redis `TYPE` name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Blob(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
        }
    }
}

/// Everything guarded by the engine lock.
#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<Bytes, Value>,
    /// Reverse index: set member -> keys of the sets containing it.
    members: HashMap<Bytes, HashSet<Bytes>>,
}

impl Keyspace {
    /// Stores `value` under `key`, dropping index entries of a replaced set.
    fn replace(&mut self, key: Bytes, value: Value) {
        if let Some(Value::Set(old)) = self.entries.get(&key) {
            let old: Vec<Bytes> = old.iter().cloned().collect();
            for member in &old {
                self.unindex(member, &key);
            }
        }
        self.entries.insert(key, value);
    }

    /// Removes a key of any type, dropping its index entries if it is a set.
    fn remove(&mut self, key: &[u8]) -> bool {
        match self.entries.remove(key) {
            Some(Value::Set(set)) => {
                for member in &set {
                    self.unindex(member, key);
                }
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    fn index(&mut self, member: Bytes, key: Bytes) {
        self.members.entry(member).or_default().insert(key);
    }

    fn unindex(&mut self, member: &[u8], key: &[u8]) {
        if let Some(keys) = self.members.get_mut(member) {
            keys.remove(key);
            if keys.is_empty() {
                self.members.remove(member);
            }
        }
    }

    fn set(&self, key: &[u8]) -> Option<&HashSet<Bytes>> {
        match self.entries.get(key) {
            Some(Value::Set(set)) => Some(set),
            _ => None,
        }
    }

    fn list(&self, key: &[u8]) -> Option<&VecDeque<Bytes>> {
        match self.entries.get(key) {
            Some(Value::List(list)) => Some(list),
            _ => None,
        }
    }

    /// Looks up every key as a set. `None` if any key is missing or not a
    /// set, which empties an intersection.
    fn all_sets(&self, keys: &[Bytes]) -> Option<Vec<&HashSet<Bytes>>> {
        keys.iter().map(|key| self.set(key)).collect()
    }
}

/// The shared keyspace.
///
/// Wrap it in an `Arc` and hand a clone to every connection; all methods take
/// `&self` and synchronise internally.
///
/// # Example
///
/// ```
/// use memkv::storage::StorageEngine;
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
/// engine.set_add(Bytes::from("colors"), Bytes::from("red")).unwrap();
/// engine.set_add(Bytes::from("fruits"), Bytes::from("red")).unwrap();
///
/// let mut keys = engine.sets_with_member(b"red").unwrap();
/// keys.sort();
/// assert_eq!(keys, vec![Bytes::from("colors"), Bytes::from("fruits")]);
/// ```
#[derive(Debug, Default)]
pub struct StorageEngine {
    keyspace: RwLock<Keyspace>,
}

impl StorageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, Keyspace>> {
        self.keyspace.read().map_err(|_| StorageError::Poisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, Keyspace>> {
        self.keyspace.write().map_err(|_| StorageError::Poisoned)
    }

    // ========================================================================
    // Key operations
    // ========================================================================

    pub fn key_exists(&self, key: &[u8]) -> StorageResult<bool> {
        Ok(self.read()?.entries.contains_key(key))
    }

    /// Deletes a key of any type.
    ///
    /// # Returns
    ///
    /// Returns `true` if the key existed.
    pub fn key_delete(&self, key: &[u8]) -> StorageResult<bool> {
        Ok(self.write()?.remove(key))
    }

    /// Returns the type name of a key, or `None` if it does not exist.
    pub fn key_type(&self, key: &[u8]) -> StorageResult<Option<&'static str>> {
        Ok(self.read()?.entries.get(key).map(Value::type_name))
    }

    /// Returns all keys matching a `LIKE` pattern (`%` any run, `_` one byte).
    ///
    /// The order of the result is unspecified.
    pub fn keys(&self, pattern: &[u8]) -> StorageResult<Vec<Bytes>> {
        let pattern = KeyPattern::new(pattern);
        let keyspace = self.read()?;

        if pattern.matches_everything() {
            return Ok(keyspace.entries.keys().cloned().collect());
        }

        Ok(keyspace
            .entries
            .keys()
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect())
    }

    /// Clears every key and the reverse index in one step.
    pub fn flush_all(&self) -> StorageResult<()> {
        let mut keyspace = self.write()?;
        keyspace.entries.clear();
        keyspace.members.clear();
        Ok(())
    }

    /// Number of keys of all types.
    pub fn len(&self) -> StorageResult<usize> {
        Ok(self.read()?.entries.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    // ========================================================================
    // Blob operations
    // ========================================================================

    /// Stores a blob, replacing whatever the key held before.
    pub fn blob_set(&self, key: Bytes, value: Bytes) -> StorageResult<()> {
        self.write()?.replace(key, Value::Blob(value));
        Ok(())
    }

    /// Returns the blob stored at `key`, or `None` if the key is missing or
    /// holds another type.
    pub fn blob_get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        match self.read()?.entries.get(key) {
            Some(Value::Blob(value)) => Ok(Some(value.clone())),
            _ => Ok(None),
        }
    }

    /// Adds `delta` to the decimal counter at `key`.
    ///
    /// A missing key (or a key of another type) counts as 0. The result is
    /// stored back as its decimal string form.
    pub fn incr_by(&self, key: &Bytes, delta: i64) -> StorageResult<i64> {
        let mut keyspace = self.write()?;

        let current = match keyspace.entries.get(&key[..]) {
            Some(Value::Blob(value)) => std::str::from_utf8(value)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or(StorageError::NotAnInteger)?,
            _ => 0,
        };

        let new_value = current.checked_add(delta).ok_or(StorageError::Overflow)?;
        keyspace.replace(key.clone(), Value::Blob(Bytes::from(new_value.to_string())));

        Ok(new_value)
    }

    // ========================================================================
    // List operations
    // ========================================================================

    /// Appends `value` at the tail of the list at `key`, creating it if needed.
    ///
    /// # Returns
    /// The length of the list after the append.
    pub fn list_append(&self, key: Bytes, value: Bytes) -> StorageResult<usize> {
        let mut keyspace = self.write()?;

        if let Some(Value::List(list)) = keyspace.entries.get_mut(&key) {
            list.push_back(value);
            return Ok(list.len());
        }

        keyspace.replace(key, Value::List(VecDeque::from([value])));
        Ok(1)
    }

    /// Returns the whole list, or an empty vector if there is none.
    pub fn list_get(&self, key: &[u8]) -> StorageResult<Vec<Bytes>> {
        Ok(self
            .read()?
            .list(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Returns the elements between `start` and `stop`, both inclusive.
    /// Negative indices count from the end (-1 is the last element); a stop
    /// past the end is clamped to the last element.
    pub fn list_range(&self, key: &[u8], start: i64, stop: i64) -> StorageResult<Vec<Bytes>> {
        let keyspace = self.read()?;
        let list = match keyspace.list(key) {
            Some(list) => list,
            None => return Ok(Vec::new()),
        };

        Ok(match range_bounds(list.len(), start, stop) {
            Some((from, to)) => list.range(from..=to).cloned().collect(),
            None => Vec::new(),
        })
    }

    /// Removes every element equal to `value`, keeping the order of the rest.
    ///
    /// # Returns
    /// The number of removed elements.
    pub fn list_remove(&self, key: &[u8], value: &[u8]) -> StorageResult<usize> {
        let mut keyspace = self.write()?;

        match keyspace.entries.get_mut(key) {
            Some(Value::List(list)) => {
                let before = list.len();
                list.retain(|element| element != value);
                Ok(before - list.len())
            }
            _ => Ok(0),
        }
    }

    // ========================================================================
    // Set operations
    // ========================================================================

    /// Adds `member` to the set at `key`, creating it if needed.
    ///
    /// # Returns
    /// `true` if the member was not already present.
    pub fn set_add(&self, key: Bytes, member: Bytes) -> StorageResult<bool> {
        let mut keyspace = self.write()?;

        let added = match keyspace.entries.get_mut(&key) {
            Some(Value::Set(set)) => set.insert(member.clone()),
            _ => {
                keyspace.replace(key.clone(), Value::Set(HashSet::from([member.clone()])));
                true
            }
        };

        if added {
            keyspace.index(member, key);
        }
        Ok(added)
    }

    /// Removes `member` from the set at `key`.
    ///
    /// # Returns
    /// `true` if the member was present.
    pub fn set_remove(&self, key: &[u8], member: &[u8]) -> StorageResult<bool> {
        let mut keyspace = self.write()?;

        let removed = match keyspace.entries.get_mut(key) {
            Some(Value::Set(set)) => set.remove(member),
            _ => false,
        };

        if removed {
            keyspace.unindex(member, key);
        }
        Ok(removed)
    }

    /// Returns the members of the set at `key`.
    pub fn set_get(&self, key: &[u8]) -> StorageResult<Vec<Bytes>> {
        Ok(self
            .read()?
            .set(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    pub fn set_cardinality(&self, key: &[u8]) -> StorageResult<usize> {
        Ok(self.read()?.set(key).map_or(0, HashSet::len))
    }

    /// Returns the members present in any of the given sets.
    pub fn set_union(&self, keys: &[Bytes]) -> StorageResult<Vec<Bytes>> {
        let keyspace = self.read()?;

        let mut union: HashSet<&Bytes> = HashSet::new();
        for set in keys.iter().filter_map(|key| keyspace.set(key)) {
            union.extend(set.iter());
        }

        Ok(union.into_iter().cloned().collect())
    }

    /// Returns the members present in every one of the given sets.
    pub fn set_intersect(&self, keys: &[Bytes]) -> StorageResult<Vec<Bytes>> {
        let keyspace = self.read()?;

        Ok(match keyspace.all_sets(keys) {
            Some(sets) => intersection(&sets).cloned().collect(),
            None => Vec::new(),
        })
    }

    /// Returns the size of the intersection without collecting it.
    pub fn set_intersect_cardinality(&self, keys: &[Bytes]) -> StorageResult<usize> {
        let keyspace = self.read()?;

        Ok(match keyspace.all_sets(keys) {
            Some(sets) => intersection(&sets).count(),
            None => 0,
        })
    }

    /// Returns the keys of every set that currently contains `member`.
    pub fn sets_with_member(&self, member: &[u8]) -> StorageResult<Vec<Bytes>> {
        Ok(self
            .read()?
            .members
            .get(member)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default())
    }
}

/// Resolves inclusive, possibly negative `start`/`stop` indices against a
/// sequence of `len` elements. `None` means the range is empty.
fn range_bounds(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;

    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len {
        return None;
    }

    Some((start as usize, stop as usize))
}

/// Iterates the members common to all `sets`, driven by the smallest one.
fn intersection<'a>(sets: &[&'a HashSet<Bytes>]) -> impl Iterator<Item = &'a Bytes> + 'a {
    let mut sets: Vec<&'a HashSet<Bytes>> = sets.to_vec();
    sets.sort_by_key(|set| set.len());

    let (smallest, rest) = match sets.split_first() {
        Some((first, rest)) => (Some(*first), rest.to_vec()),
        None => (None, Vec::new()),
    };

    smallest
        .into_iter()
        .flat_map(|set| set.iter())
        .filter(move |member| rest.iter().all(|set| set.contains(*member)))
}
