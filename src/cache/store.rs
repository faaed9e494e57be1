//! Cache Store Module
//!
//! Byte-bounded storage engine combining a HashMap with LRU tracking and lazy TTL expiration.

use std::collections::HashMap;

use bytes::Bytes;

use crate::cache::{CacheEntry, CacheStats, LruTracker, MAX_KEY_LENGTH};
use crate::error::{CacheError, Result};

/// Outcome of a local lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Live entry with data
    Hit(Bytes),
    /// Live absent-marker: the backing store confirmed there is no such row
    Absent,
    /// Nothing usable cached (never stored, deleted, or expired)
    Miss,
}

// == Cache Store ==
/// Storage for one cache group with LRU eviction and TTL support.
///
/// Invariant: `current_bytes <= max_bytes` after every public call returns.
#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    stats: CacheStats,
    /// Capacity bound in bytes (key length + value length per entry)
    max_bytes: usize,
    current_bytes: usize,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore bounded to `max_bytes`.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_bytes,
            current_bytes: 0,
        }
    }

    // == Add ==
    /// Stores a value (or an absent-marker when `value` is None) with optional TTL.
    ///
    /// Overwrites reset the TTL. After insertion, least recently used entries are
    /// evicted until the store is back under its byte budget.
    pub fn add(&mut self, key: &str, value: Option<Bytes>, ttl: Option<u64>) -> Result<()> {
        if key.is_empty() || key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Key must be 1..={} bytes",
                MAX_KEY_LENGTH
            )));
        }

        let entry = CacheEntry::new(value, ttl);
        let charge = entry.charge(key);
        if charge > self.max_bytes {
            return Err(CacheError::InvalidRequest(format!(
                "Entry of {} bytes exceeds the group budget of {} bytes",
                charge, self.max_bytes
            )));
        }

        if let Some(old) = self.entries.insert(key.to_string(), entry) {
            self.current_bytes -= old.charge(key);
        }
        self.current_bytes += charge;
        self.lru.touch(key);

        while self.current_bytes > self.max_bytes {
            match self.lru.evict_oldest() {
                Some(evicted) => {
                    if let Some(old) = self.entries.remove(&evicted) {
                        self.current_bytes -= old.charge(&evicted);
                        self.stats.record_eviction();
                    }
                }
                None => break,
            }
        }

        self.refresh_usage();
        Ok(())
    }

    // == Get ==
    /// Looks up a key, dropping it if expired.
    ///
    /// Live entries (data or absent-marker) count as hits and become most recently used.
    pub fn get(&mut self, key: &str) -> Lookup {
        let found = self.lookup(key);
        match found {
            Lookup::Miss => self.stats.record_miss(),
            _ => self.stats.record_hit(),
        }
        found
    }

    // == Peek ==
    /// Same as [`get`](Self::get) without touching hit/miss counters.
    pub fn peek(&mut self, key: &str) -> Lookup {
        self.lookup(key)
    }

    fn lookup(&mut self, key: &str) -> Lookup {
        let expired = match self.entries.get(key) {
            None => return Lookup::Miss,
            Some(entry) => entry.is_expired(),
        };

        if expired {
            self.remove_entry(key);
            return Lookup::Miss;
        }

        self.lru.touch(key);
        match self.entries.get(key).and_then(|e| e.value.clone()) {
            Some(bytes) => Lookup::Hit(bytes),
            None => Lookup::Absent,
        }
    }

    // == Delete ==
    /// Removes an entry by key, returning whether one was present.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.remove_entry(key);
        self.refresh_usage();
        removed
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.remove_entry(key);
        }

        self.refresh_usage();
        expired_keys.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    /// Mutable stats access for the owning group's load and peer counters.
    pub(crate) fn stats_mut(&mut self) -> &mut CacheStats {
        &mut self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_bytes(&self) -> usize {
        self.current_bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(old) => {
                self.current_bytes -= old.charge(key);
                self.lru.remove(key);
                self.refresh_usage();
                true
            }
            None => false,
        }
    }

    fn refresh_usage(&mut self) {
        self.stats.set_usage(self.entries.len(), self.current_bytes);
    }
}
