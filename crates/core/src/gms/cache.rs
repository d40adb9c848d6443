//! Store for non-deterministic GMS results
//!
//! GMS results differ between identical requests, so they are never keyed by
//! their inputs. Each insert gets a fresh random key and an entry can be taken
//! exactly once.

use super::GmsResult;
use crate::error::{PshaError, Result};
use rustc_hash::FxHashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Thread-safe take-once GMS result store
#[derive(Debug, Default)]
pub struct GmsCache {
    entries: Mutex<FxHashMap<Uuid, GmsResult>>,
}

impl GmsCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FxHashMap<Uuid, GmsResult>> {
        // Entries are only moved in and out, a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a result under a freshly generated key
    pub fn insert(&self, mut result: GmsResult) -> Uuid {
        let mut entries = self.lock();
        let mut key = Uuid::new_v4();
        while entries.contains_key(&key) {
            key = Uuid::new_v4();
        }
        result.id = key;
        entries.insert(key, result);
        key
    }

    /// Remove and return the result stored under `key`
    pub fn take(&self, key: &Uuid) -> Result<GmsResult> {
        self.lock().remove(key).ok_or(PshaError::CacheMiss(*key))
    }

    /// Number of stored results
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
