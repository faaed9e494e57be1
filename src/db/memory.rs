//! In-process tables implementing [`CourseStore`], used when no database is configured.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::db::{Course, CourseStore, User};
use crate::error::Result;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<i64, User>,
    courses: BTreeMap<i64, Course>,
    /// (student_id, course_id)
    enrollments: BTreeSet<(i64, i64)>,
}

/// One mutex over all tables; `reserve_seat` is atomic because it runs under it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.tables.lock().await.users.insert(user.user_id, user);
    }

    pub async fn insert_course(&self, course: Course) {
        self.tables.lock().await.courses.insert(course.course_id, course);
    }

    /// Overwrites a course's remaining capacity, returning false if the course is unknown.
    pub async fn set_remaining_cap(&self, course_id: i64, remain_cap: i32) -> bool {
        match self.tables.lock().await.courses.get_mut(&course_id) {
            Some(course) => {
                course.remain_cap = remain_cap;
                true
            }
            None => false,
        }
    }

    pub async fn enrollment_count(&self, course_id: i64) -> usize {
        self.tables
            .lock()
            .await
            .enrollments
            .iter()
            .filter(|(_, c)| *c == course_id)
            .count()
    }
}

#[async_trait]
impl CourseStore for MemoryStore {
    async fn user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self.tables.lock().await.users.get(&user_id).cloned())
    }

    async fn user_by_name(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .tables
            .lock()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn course(&self, course_id: i64) -> Result<Option<Course>> {
        Ok(self.tables.lock().await.courses.get(&course_id).cloned())
    }

    async fn remaining_cap(&self, course_id: i64) -> Result<Option<i32>> {
        Ok(self
            .tables
            .lock()
            .await
            .courses
            .get(&course_id)
            .map(|c| c.remain_cap))
    }

    async fn has_enrollment(&self, student_id: i64, course_id: i64) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .enrollments
            .contains(&(student_id, course_id)))
    }

    async fn student_courses(&self, student_id: i64) -> Result<Vec<i64>> {
        Ok(self
            .tables
            .lock()
            .await
            .enrollments
            .range((student_id, i64::MIN)..=(student_id, i64::MAX))
            .map(|(_, c)| *c)
            .collect())
    }

    async fn reserve_seat(&self, student_id: i64, course_id: i64) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        if tables.enrollments.contains(&(student_id, course_id)) {
            return Ok(0);
        }
        match tables.courses.get_mut(&course_id) {
            Some(course) if course.remain_cap > 0 => {
                course.remain_cap -= 1;
                tables.enrollments.insert((student_id, course_id));
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}
