//! Postgres-backed [`CourseStore`] using sqlx.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::db::{Course, CourseStore, User};
use crate::error::Result;

/// Tables the store reads and the seat reservation writes.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS member (
    user_id     BIGSERIAL PRIMARY KEY,
    username    TEXT NOT NULL UNIQUE,
    password    TEXT NOT NULL DEFAULT '',
    nickname    TEXT NOT NULL,
    user_type   INTEGER NOT NULL,
    is_active   BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS course (
    course_id   BIGSERIAL PRIMARY KEY,
    course_name TEXT NOT NULL UNIQUE,
    cap         INTEGER NOT NULL,
    remain_cap  INTEGER NOT NULL,
    teacher_id  BIGINT
);

CREATE TABLE IF NOT EXISTS student_course (
    student_id  BIGINT NOT NULL,
    course_id   BIGINT NOT NULL REFERENCES course (course_id),
    PRIMARY KEY (student_id, course_id)
);
"#;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Opens a pool against `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url)
            .await?;
        info!(max_connections, "connected to postgres");
        Ok(Self::new(pool))
    }

    /// Creates missing tables.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CourseStore for PgStore {
    async fn user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, username, nickname, user_type, is_active FROM member WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_by_name(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, username, nickname, user_type, is_active FROM member WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn course(&self, course_id: i64) -> Result<Option<Course>> {
        let course = sqlx::query_as::<_, Course>(
            "SELECT course_id, course_name, cap, remain_cap, teacher_id FROM course WHERE course_id = $1",
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(course)
    }

    async fn remaining_cap(&self, course_id: i64) -> Result<Option<i32>> {
        let cap = sqlx::query_scalar::<_, i32>("SELECT remain_cap FROM course WHERE course_id = $1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(cap)
    }

    async fn has_enrollment(&self, student_id: i64, course_id: i64) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM student_course WHERE student_id = $1 AND course_id = $2)",
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn student_courses(&self, student_id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT course_id FROM student_course WHERE student_id = $1 ORDER BY course_id",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn reserve_seat(&self, student_id: i64, course_id: i64) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        // Claiming the enrollment first serializes bookings by the same student on
        // the primary key; the loser sees the winner's row and inserts nothing.
        let claimed = sqlx::query(
            r#"
            INSERT INTO student_course (student_id, course_id)
            SELECT $1, course_id FROM course WHERE course_id = $2 AND remain_cap > 0
            ON CONFLICT (student_id, course_id) DO NOTHING
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if claimed == 0 {
            return Ok(0);
        }

        let seat = sqlx::query(
            "UPDATE course SET remain_cap = remain_cap - 1 WHERE course_id = $1 AND remain_cap > 0",
        )
        .bind(course_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if seat == 0 {
            // last seat went to a concurrent booker; dropping tx undoes the claim
            return Ok(0);
        }

        tx.commit().await?;
        Ok(seat)
    }
}
