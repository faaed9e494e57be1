//! Cache Module
//!
//! Named read-through cache groups with byte-bounded LRU eviction, TTL
//! expiration and single-flight loading.

mod entry;
mod group;
mod loader;
mod lru;
mod manager;
mod singleflight;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use group::{CacheGroup, GetOptions, GroupConfig, LookupStrategy};
pub use loader::{Loader, LoaderFn};
pub use lru::LruTracker;
pub use manager::CacheManager;
pub use singleflight::SingleFlight;
pub use stats::CacheStats;
pub use store::{CacheStore, Lookup};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
