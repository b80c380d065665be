//! Thread-Safe Key-Value Store
//!
//! Every client connection shares one `Store`. Keys and values are plain
//! text; the store knows nothing about the wire format.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A key always lives in the same shard, so holding that shard's write lock
//! makes a read-modify-write on the key atomic. `incr_by` relies on this:
//! two connections incrementing the same counter can never lose an update.
//!
//! Multi-key operations (`delete_many`, `flush`) lock one shard at a time and
//! are therefore not atomic as a whole.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use thiserror::Error;

/// Number of shards. More shards means less lock contention between
/// connections touching different keys.
const NUM_SHARDS: usize = 64;

/// Errors from read-modify-write operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The current value does not parse as a base-10 `i64`
    #[error("value is not an integer")]
    NotAnInteger,

    /// The result does not fit in an `i64`
    #[error("increment or decrement would overflow")]
    Overflow,
}

type Shard = RwLock<HashMap<String, String>>;

/// The shared in-memory key-value store.
///
/// # Example
///
/// ```
/// use emberkv::storage::Store;
///
/// let store = Store::new();
/// store.set("foo".to_string(), "bar".to_string());
/// assert_eq!(store.get("foo"), Some("bar".to_string()));
///
/// assert_eq!(store.incr("visits"), Ok(1));
/// assert!(store.delete("foo"));
/// assert_eq!(store.len(), 1);
/// ```
pub struct Store {
    shards: Vec<Shard>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("shards", &self.shards.len())
            .field("keys", &self.len())
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self { shards }
    }

    #[inline]
    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    #[inline]
    fn shard(&self, key: &str) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// Returns `true` if the key did not exist before.
    pub fn set(&self, key: String, value: String) -> bool {
        let mut data = self.shard(&key).write();
        data.insert(key, value).is_none()
    }

    /// Returns a copy of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.shard(key).read().get(key).cloned()
    }

    /// Removes `key`. Returns `true` if it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.shard(key).write().remove(key).is_some()
    }

    /// Removes every key in `keys` and returns how many were actually present.
    ///
    /// A key listed twice is only counted once, since the second removal
    /// finds nothing.
    pub fn delete_many(&self, keys: &[String]) -> u64 {
        keys.iter().filter(|key| self.delete(key)).count() as u64
    }

    pub fn exists(&self, key: &str) -> bool {
        self.shard(key).read().contains_key(key)
    }

    /// Increments the integer stored at `key` by `delta`.
    ///
    /// A missing key counts as `"0"`. On error the stored value is left
    /// untouched.
    pub fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut data = self.shard(key).write();

        let current = match data.get(key) {
            Some(value) => value
                .parse::<i64>()
                .map_err(|_| StoreError::NotAnInteger)?,
            None => 0,
        };
        let new_value = current.checked_add(delta).ok_or(StoreError::Overflow)?;

        data.insert(key.to_string(), new_value.to_string());
        Ok(new_value)
    }

    pub fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.incr_by(key, 1)
    }

    pub fn decr(&self, key: &str) -> Result<i64, StoreError> {
        self.incr_by(key, -1)
    }

    /// Removes every key.
    pub fn flush(&self) {
        for shard in &self.shards {
            shard.write().clear();
        }
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }
}
