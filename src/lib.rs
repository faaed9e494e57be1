//! Course Cache - a distributed read-through cache for course enrollment
//!
//! Named cache groups with byte-bounded LRU eviction, TTL expiration and
//! single-flight loading, routed across nodes by a consistent-hash ring, plus
//! the seat-booking and teacher-scheduling logic built on top of them.

pub mod api;
pub mod booking;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod peer;
pub mod scheduler;
pub mod tasks;

pub use api::{create_router, AppState};
pub use booking::{BookingCoordinator, BookingOutcome};
pub use cache::{CacheManager, GetOptions, LookupStrategy};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_cleanup_task;
