//! Relational Store Module
//!
//! The rows the cache shields and the one conditional write booking relies on.

mod memory;
mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Member row as cached by the `login` and `user` groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub nickname: String,
    pub user_type: i32,
    pub is_active: bool,
}

/// Course row as cached by the `course_info` group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Course {
    pub course_id: i64,
    pub course_name: String,
    pub cap: i32,
    pub remain_cap: i32,
    pub teacher_id: Option<i64>,
}

// == Course Store ==
/// Point reads by primary key plus the atomic seat reservation.
#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn user_by_id(&self, user_id: i64) -> Result<Option<User>>;

    async fn user_by_name(&self, username: &str) -> Result<Option<User>>;

    async fn course(&self, course_id: i64) -> Result<Option<Course>>;

    async fn remaining_cap(&self, course_id: i64) -> Result<Option<i32>>;

    async fn has_enrollment(&self, student_id: i64, course_id: i64) -> Result<bool>;

    /// Course ids the student is enrolled in, ascending.
    async fn student_courses(&self, student_id: i64) -> Result<Vec<i64>>;

    /// Decrements the course's remaining capacity only while it is above zero
    /// and the student is not yet enrolled, recording the enrollment in the
    /// same atomic step. Returns rows affected: 1 on success, 0 otherwise.
    async fn reserve_seat(&self, student_id: i64, course_id: i64) -> Result<u64>;
}
