//! Response DTOs for the node's HTTP API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::booking::BookingOutcome;
use crate::cache::CacheStats;
use crate::db::Course;

/// Ring membership after a peer change, or on `GET /peers`.
#[derive(Debug, Clone, Serialize)]
pub struct PeersResponse {
    pub hosts: Vec<String>,
}

impl PeersResponse {
    pub fn new(hosts: Vec<String>) -> Self {
        Self { hosts }
    }
}

/// Response body for `POST /api/v1/student/book_course`
#[derive(Debug, Clone, Serialize)]
pub struct BookCourseResponse {
    pub outcome: BookingOutcome,
    pub message: String,
}

impl BookCourseResponse {
    pub fn new(outcome: BookingOutcome) -> Self {
        Self {
            outcome,
            message: outcome.message().to_string(),
        }
    }
}

/// Response body for `GET /api/v1/student/course`
#[derive(Debug, Clone, Serialize)]
pub struct StudentCourseResponse {
    pub user_id: i64,
    pub course_list: Vec<Course>,
}

/// Response body for `POST /api/v1/course/schedule`: teacher id to assigned course id.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleResponse {
    pub assignments: BTreeMap<String, String>,
}

/// Counters for one cache group.
///
/// # Fields
/// - `hit_rate`: hits / (hits + misses), 0.0 before any lookup
#[derive(Debug, Clone, Serialize)]
pub struct GroupStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub loads: u64,
    pub peer_loads: u64,
    pub peer_errors: u64,
    pub total_entries: usize,
    pub current_bytes: usize,
    pub hit_rate: f64,
}

impl From<&CacheStats> for GroupStatsResponse {
    fn from(stats: &CacheStats) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            loads: stats.loads,
            peer_loads: stats.peer_loads,
            peer_errors: stats.peer_errors,
            total_entries: stats.total_entries,
            current_bytes: stats.current_bytes,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub node: String,
    pub groups: BTreeMap<String, GroupStatsResponse>,
}

impl StatsResponse {
    pub fn new(node: impl Into<String>, stats: &BTreeMap<String, CacheStats>) -> Self {
        Self {
            node: node.into(),
            groups: stats
                .iter()
                .map(|(name, s)| (name.clone(), GroupStatsResponse::from(s)))
                .collect(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
