//! Booking Module
//!
//! Seat reservation under concurrent demand. The cached remaining capacity is
//! an optimistic fast path; the store's conditional decrement is the only gate
//! against overbooking, and the cache is corrected to match it afterwards.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cache::{CacheGroup, GetOptions, LookupStrategy};
use crate::catalog::{enrollment_key, parse_course_list, Catalog, ENROLLED};
use crate::db::{Course, CourseStore};
use crate::error::{CacheError, Result};

/// Result of a booking attempt that reached a decision.
///
/// Store failures are not an outcome; they surface as `Err(CacheError::Internal)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingOutcome {
    Booked,
    StudentHasCourse,
    CourseNotAvailable,
    CourseNotExist,
}

impl BookingOutcome {
    pub fn message(self) -> &'static str {
        match self {
            BookingOutcome::Booked => "course booked",
            BookingOutcome::StudentHasCourse => "student already has this course",
            BookingOutcome::CourseNotAvailable => "no seats left",
            BookingOutcome::CourseNotExist => "course does not exist",
        }
    }
}

// == Booking Coordinator ==
pub struct BookingCoordinator {
    catalog: Catalog,
    /// TTL in seconds of the optimistic capacity written before the store update
    cap_ttl: u64,
}

impl BookingCoordinator {
    pub fn new(catalog: Catalog, cap_ttl: u64) -> Self {
        Self { catalog, cap_ttl }
    }

    // == Book Course ==
    /// Tries to give `user_id` a seat in `course_id`.
    pub async fn book_course(&self, user_id: i64, course_id: i64) -> Result<BookingOutcome> {
        let student_course = self.catalog.student_course().await;
        let remain_cap = self.catalog.remain_cap().await;
        let enrolled_key = enrollment_key(user_id, course_id);
        let course_key = course_id.to_string();

        let known = student_course
            .get(&enrolled_key, GetOptions::new(LookupStrategy::LocalOnly))
            .await?;
        if known.is_some() {
            return Ok(BookingOutcome::StudentHasCourse);
        }

        let remain = match remain_cap
            .get(&course_key, GetOptions::new(LookupStrategy::LocalThenGetter))
            .await?
        {
            Some(value) => parse_cap(&remain_cap, &course_key, &value).await?,
            None => return Ok(BookingOutcome::CourseNotExist),
        };
        if remain <= 0 {
            return Ok(BookingOutcome::CourseNotAvailable);
        }

        // Concurrent bookers may have taken the last cached seat since the read.
        if let Some(left) = remain_cap.adjust(&course_key, -1, Some(self.cap_ttl)).await? {
            if left < 0 {
                self.release_cap(&remain_cap, &course_key).await;
                return Ok(BookingOutcome::CourseNotAvailable);
            }
        }

        let rows = match self.catalog.store().reserve_seat(user_id, course_id).await {
            Ok(rows) => rows,
            Err(err) => {
                error!(user_id, course_id, error = %err, "seat reservation failed");
                self.release_cap(&remain_cap, &course_key).await;
                return Err(CacheError::Internal(format!("booking failed: {}", err)));
            }
        };

        if rows == 0 {
            return self
                .reconcile_rejected(user_id, course_id, remain, &remain_cap, &student_course)
                .await;
        }

        self.mark_enrolled(&student_course, user_id, course_id).await;
        info!(user_id, course_id, "course booked");
        Ok(BookingOutcome::Booked)
    }

    /// Courses the student is enrolled in, read through `student_course` and `course_info`.
    pub async fn student_courses(&self, user_id: i64) -> Result<Vec<Course>> {
        let listing = self
            .catalog
            .student_course()
            .await
            .get(&user_id.to_string(), GetOptions::default())
            .await?;
        let Some(listing) = listing else {
            return Ok(Vec::new());
        };

        let course_info = self.catalog.course_info().await;
        let mut courses = Vec::new();
        for course_id in parse_course_list(&listing)? {
            let key = course_id.to_string();
            let Some(value) = course_info.get(&key, GetOptions::default()).await? else {
                debug!(user_id, course_id, "enrolled course has no row");
                continue;
            };
            match serde_json::from_slice::<Course>(&value) {
                Ok(course) => courses.push(course),
                Err(err) => {
                    warn!(course_id, error = %err, "dropping undecodable course entry");
                    course_info.del(&key).await;
                }
            }
        }
        Ok(courses)
    }

    /// The store refused the seat. Either the student already holds it, or the
    /// cached capacity was stale and is forced to zero.
    async fn reconcile_rejected(
        &self,
        user_id: i64,
        course_id: i64,
        remain: i64,
        remain_cap: &CacheGroup,
        student_course: &CacheGroup,
    ) -> Result<BookingOutcome> {
        let course_key = course_id.to_string();
        let enrolled = self
            .catalog
            .store()
            .has_enrollment(user_id, course_id)
            .await
            .map_err(|e| CacheError::Internal(format!("booking failed: {}", e)))?;

        if enrolled {
            self.release_cap(remain_cap, &course_key).await;
            self.mark_enrolled(student_course, user_id, course_id).await;
            return Ok(BookingOutcome::StudentHasCourse);
        }

        warn!(course_id, cached = remain, "cached capacity was stale, resetting to 0");
        self.write_cap(remain_cap, &course_key, 0).await;
        Ok(BookingOutcome::CourseNotAvailable)
    }

    async fn write_cap(&self, remain_cap: &CacheGroup, course_key: &str, value: i64) {
        let bytes = Bytes::from(value.to_string());
        if let Err(err) = remain_cap.add(course_key, bytes, Some(self.cap_ttl)).await {
            warn!(course = course_key, error = %err, "failed to cache remaining capacity");
        }
    }

    /// Gives back the seat taken by the optimistic decrement.
    async fn release_cap(&self, remain_cap: &CacheGroup, course_key: &str) {
        if let Err(err) = remain_cap.adjust(course_key, 1, Some(self.cap_ttl)).await {
            warn!(course = course_key, error = %err, "failed to restore remaining capacity");
        }
    }

    async fn mark_enrolled(&self, student_course: &CacheGroup, user_id: i64, course_id: i64) {
        let key = enrollment_key(user_id, course_id);
        let ttl = student_course.config().default_ttl;
        if let Err(err) = student_course
            .add(&key, Bytes::from_static(ENROLLED), Some(ttl))
            .await
        {
            warn!(key = %key, error = %err, "failed to cache enrollment");
        }
        // the listing is rebuilt on next read
        student_course.del(&user_id.to_string()).await;
    }
}

async fn parse_cap(group: &CacheGroup, key: &str, value: &[u8]) -> Result<i64> {
    let parsed = std::str::from_utf8(value)
        .ok()
        .and_then(|text| text.trim().parse::<i64>().ok());
    match parsed {
        Some(cap) => Ok(cap),
        None => {
            group.del(key).await;
            Err(CacheError::Internal(format!(
                "corrupt remaining capacity for course {}",
                key
            )))
        }
    }
}
