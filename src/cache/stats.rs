//! Cache Statistics Module
//!
//! Tracks per-group performance metrics including hits, misses, loads and evictions.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics for one group.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the local store
    pub hits: u64,
    /// Lookups that missed the local store
    pub misses: u64,
    /// Entries evicted to stay within the byte budget
    pub evictions: u64,
    /// Loader executions (after single-flight collapse)
    pub loads: u64,
    /// Values fetched from a remote peer
    pub peer_loads: u64,
    /// Peer fetches that failed with a transport error
    pub peer_errors: u64,
    /// Current number of entries in the store
    pub total_entries: usize,
    /// Bytes currently charged against the budget
    pub current_bytes: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_load(&mut self) {
        self.loads += 1;
    }

    pub fn record_peer_load(&mut self) {
        self.peer_loads += 1;
    }

    pub fn record_peer_error(&mut self) {
        self.peer_errors += 1;
    }

    /// Refreshes the size gauges after a mutation.
    pub fn set_usage(&mut self, entries: usize, bytes: usize) {
        self.total_entries = entries;
        self.current_bytes = bytes;
    }
}
