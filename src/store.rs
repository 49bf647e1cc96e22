//! Attempt-tracking state and the storage interface behind it.
//!
//! The engine and recorder only ever talk to an [`AttemptStore`], so a shared external
//! store (e.g. a key-value cache) can stand in for [`InMemoryAttemptStore`] without
//! touching call sites. Writes that depend on a previous read go through
//! [`AttemptStore::compare_and_swap`] so concurrent decisions for one key cannot
//! silently overwrite each other.

use async_trait::async_trait;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Failure history for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttemptRecord {
    /// Failed attempts in the current window.
    pub attempts: u32,
    /// Start of the current window (millis).
    pub first_attempt: u64,
    /// Time of the last failure (millis).
    pub last_attempt: u64,
    /// End of the punitive block, if one is active.
    pub blocked_until: Option<u64>,
}

impl AttemptRecord {
    /// An empty cycle starting at `now`.
    pub const fn fresh(now: u64) -> Self {
        Self { attempts: 0, first_attempt: now, last_attempt: now, blocked_until: None }
    }

    /// True while a block is in force at `now`.
    pub fn is_blocked_at(&self, now: u64) -> bool {
        matches!(self.blocked_until, Some(until) if now < until)
    }

    /// True once a block has run out; such records are purged.
    pub fn block_expired_at(&self, now: u64) -> bool {
        matches!(self.blocked_until, Some(until) if now >= until)
    }

    /// True when the window that started at `first_attempt` has elapsed.
    pub fn window_elapsed_at(&self, now: u64, window_millis: u64) -> bool {
        now.saturating_sub(self.first_attempt) > window_millis
    }

    /// No failures and no block: equivalent to an absent record.
    pub fn is_vacant(&self) -> bool {
        self.attempts == 0 && self.blocked_until.is_none()
    }
}

/// Abstract storage for attempt records.
#[async_trait]
pub trait AttemptStore: Send + Sync + std::fmt::Debug + 'static {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the record for `key`.
    async fn get(&self, key: &str) -> Result<Option<AttemptRecord>, Self::Error>;

    /// Unconditionally store `record` under `key`.
    async fn insert(&self, key: &str, record: AttemptRecord) -> Result<(), Self::Error>;

    /// Delete `key`, returning what was stored.
    async fn remove(&self, key: &str) -> Result<Option<AttemptRecord>, Self::Error>;

    /// Copy of every entry, in no particular order.
    async fn snapshot(&self) -> Result<Vec<(String, AttemptRecord)>, Self::Error>;

    /// Delete every record whose block has expired at `now`. Returns how many were removed.
    async fn purge_expired(&self, now: u64) -> Result<usize, Self::Error>;

    /// Replace the value under `key` only if it still equals `expected`
    /// (`None` = key absent). `new = None` deletes the key.
    ///
    /// Returns `Ok(false)` when another writer got there first.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&AttemptRecord>,
        new: Option<AttemptRecord>,
    ) -> Result<bool, Self::Error>;
}

/// Process-local store. Clones share the same map.
#[derive(Default, Clone, Debug)]
pub struct InMemoryAttemptStore {
    records: Arc<Mutex<HashMap<String, AttemptRecord>>>,
}

impl InMemoryAttemptStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget everything.
    pub fn clear(&self) {
        self.lock().clear();
    }

    // Records are plain data; a panic elsewhere can't leave one half-written.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, AttemptRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    type Error = Infallible;

    async fn get(&self, key: &str) -> Result<Option<AttemptRecord>, Self::Error> {
        Ok(self.lock().get(key).copied())
    }

    async fn insert(&self, key: &str, record: AttemptRecord) -> Result<(), Self::Error> {
        self.lock().insert(key.to_string(), record);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<AttemptRecord>, Self::Error> {
        Ok(self.lock().remove(key))
    }

    async fn snapshot(&self) -> Result<Vec<(String, AttemptRecord)>, Self::Error> {
        Ok(self.lock().iter().map(|(k, v)| (k.clone(), *v)).collect())
    }

    async fn purge_expired(&self, now: u64) -> Result<usize, Self::Error> {
        let mut guard = self.lock();
        let before = guard.len();
        guard.retain(|_, record| !record.block_expired_at(now));
        Ok(before - guard.len())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&AttemptRecord>,
        new: Option<AttemptRecord>,
    ) -> Result<bool, Self::Error> {
        let mut guard = self.lock();
        if guard.get(key) != expected {
            return Ok(false);
        }
        match new {
            Some(record) => {
                guard.insert(key.to_string(), record);
            }
            None => {
                guard.remove(key);
            }
        }
        Ok(true)
    }
}
