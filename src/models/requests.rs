//! Request DTOs for the node's HTTP API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use std::collections::BTreeMap;

use reqwest::Url;
use serde::Deserialize;

/// Body of `POST /peers` and `DELETE /peers`.
#[derive(Debug, Clone, Deserialize)]
pub struct PeerRequest {
    /// Base URL of the node, e.g. `http://10.0.0.2:3000`
    pub host: String,
}

impl PeerRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        let host = self.host.trim();
        if host.is_empty() {
            return Some("Host cannot be empty".to_string());
        }
        match Url::parse(host) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => None,
            _ => Some(format!("Host '{}' is not an http(s) base URL", host)),
        }
    }
}

/// Body of `POST /api/v1/student/book_course`.
#[derive(Debug, Clone, Deserialize)]
pub struct BookCourseRequest {
    pub user_id: i64,
    pub course_id: i64,
}

impl BookCourseRequest {
    pub fn validate(&self) -> Option<String> {
        if self.user_id <= 0 {
            return Some("user_id must be positive".to_string());
        }
        if self.course_id <= 0 {
            return Some("course_id must be positive".to_string());
        }
        None
    }
}

/// Query of `GET /api/v1/student/course`.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentCourseQuery {
    pub user_id: i64,
}

/// Body of `POST /api/v1/course/schedule`: teacher id to the course ids they can teach.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct ScheduleRequest(pub BTreeMap<String, Vec<String>>);
