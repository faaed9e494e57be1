//! Catalog Module
//!
//! The named cache groups the enrollment service reads through, and the loaders
//! that fill them from the relational store.
//!
//! | group               | key            | value                                  |
//! |---------------------|----------------|----------------------------------------|
//! | `login`             | username       | JSON [`User`]                          |
//! | `user`              | user id        | JSON [`User`]                          |
//! | `course_info`       | course id      | JSON [`Course`]                        |
//! | `course_remain_cap` | course id      | remaining capacity as decimal text     |
//! | `student_course`    | `uid_cid`      | `"1"` when enrolled                    |
//! | `student_course`    | `uid`          | enrolled course ids joined with `_`    |

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tracing::debug;

use crate::cache::{CacheGroup, CacheManager, GroupConfig, Loader};
use crate::config::Config;
use crate::db::{Course, CourseStore, User};
use crate::error::{CacheError, Result};

pub const LOGIN_GROUP: &str = "login";
pub const USER_GROUP: &str = "user";
pub const COURSE_INFO_GROUP: &str = "course_info";
pub const COURSE_REMAIN_CAP_GROUP: &str = "course_remain_cap";
pub const STUDENT_COURSE_GROUP: &str = "student_course";

const MIB: usize = 1 << 20;

/// Marker value stored under `uid_cid` once an enrollment is known.
pub const ENROLLED: &[u8] = b"1";

/// Key of the "is this student enrolled in this course" entry.
pub fn enrollment_key(student_id: i64, course_id: i64) -> String {
    format!("{}_{}", student_id, course_id)
}

/// Splits a `student_course` listing value into course ids.
pub fn parse_course_list(value: &[u8]) -> Result<Vec<i64>> {
    let text = std::str::from_utf8(value)
        .map_err(|_| CacheError::Internal("course list is not utf-8".to_string()))?;
    text.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| CacheError::Internal(format!("bad course id in list: {}", part)))
        })
        .collect()
}

fn to_json<T: Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| CacheError::Internal(format!("failed to encode row: {}", e)))
}

// == Catalog ==
/// Hands out the service's cache groups, creating each on first use with its
/// budget and loader.
#[derive(Clone)]
pub struct Catalog {
    manager: Arc<CacheManager>,
    store: Arc<dyn CourseStore>,
    default_ttl: u64,
    peer_timeout: std::time::Duration,
}

impl Catalog {
    pub fn new(manager: Arc<CacheManager>, store: Arc<dyn CourseStore>, config: &Config) -> Self {
        Self {
            manager,
            store,
            default_ttl: config.default_ttl,
            peer_timeout: config.peer_timeout(),
        }
    }

    pub fn manager(&self) -> &Arc<CacheManager> {
        &self.manager
    }

    pub fn store(&self) -> &Arc<dyn CourseStore> {
        &self.store
    }

    /// Creates every group up front so peers can serve them before the first local read.
    pub async fn register_all(&self) {
        self.login().await;
        self.user().await;
        self.course_info().await;
        self.remain_cap().await;
        self.student_course().await;
    }

    pub async fn login(&self) -> Arc<CacheGroup> {
        let loader = Arc::new(UserByNameLoader::new(self.store.clone()));
        self.group(LOGIN_GROUP, 64 * MIB, loader).await
    }

    pub async fn user(&self) -> Arc<CacheGroup> {
        let loader = Arc::new(UserInfoLoader::new(self.store.clone()));
        self.group(USER_GROUP, 64 * MIB, loader).await
    }

    pub async fn course_info(&self) -> Arc<CacheGroup> {
        let loader = Arc::new(CourseInfoLoader::new(self.store.clone()));
        self.group(COURSE_INFO_GROUP, 128 * MIB, loader).await
    }

    pub async fn remain_cap(&self) -> Arc<CacheGroup> {
        let loader = Arc::new(RemainCapLoader::new(self.store.clone()));
        self.group(COURSE_REMAIN_CAP_GROUP, 10 * MIB, loader).await
    }

    pub async fn student_course(&self) -> Arc<CacheGroup> {
        let loader = Arc::new(StudentCourseLoader::new(self.store.clone()));
        self.group(STUDENT_COURSE_GROUP, 128 * MIB, loader).await
    }

    async fn group(&self, name: &str, max_bytes: usize, loader: Arc<dyn Loader>) -> Arc<CacheGroup> {
        let config = GroupConfig::new(max_bytes)
            .with_default_ttl(self.default_ttl)
            .with_peer_timeout(self.peer_timeout);
        self.manager.get_or_create(name, config, Some(loader)).await
    }
}

// == Loaders ==

/// `login`: username to user row.
pub struct UserByNameLoader {
    store: Arc<dyn CourseStore>,
}

impl UserByNameLoader {
    pub fn new(store: Arc<dyn CourseStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Loader for UserByNameLoader {
    async fn load(&self, key: &str) -> Result<Option<Bytes>> {
        match self.store.user_by_name(key).await? {
            Some(user) => to_json(&user).map(Some),
            None => Ok(None),
        }
    }
}

/// `user`: user id to user row.
pub struct UserInfoLoader {
    store: Arc<dyn CourseStore>,
}

impl UserInfoLoader {
    pub fn new(store: Arc<dyn CourseStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Loader for UserInfoLoader {
    async fn load(&self, key: &str) -> Result<Option<Bytes>> {
        let Ok(user_id) = key.parse::<i64>() else {
            debug!(key, "non-numeric user key");
            return Ok(None);
        };
        let user: Option<User> = self.store.user_by_id(user_id).await?;
        user.map(|u| to_json(&u)).transpose()
    }
}

/// `course_info`: course id to course row.
pub struct CourseInfoLoader {
    store: Arc<dyn CourseStore>,
}

impl CourseInfoLoader {
    pub fn new(store: Arc<dyn CourseStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Loader for CourseInfoLoader {
    async fn load(&self, key: &str) -> Result<Option<Bytes>> {
        let Ok(course_id) = key.parse::<i64>() else {
            debug!(key, "non-numeric course key");
            return Ok(None);
        };
        let course: Option<Course> = self.store.course(course_id).await?;
        course.map(|c| to_json(&c)).transpose()
    }
}

/// `course_remain_cap`: course id to remaining seats.
pub struct RemainCapLoader {
    store: Arc<dyn CourseStore>,
}

impl RemainCapLoader {
    pub fn new(store: Arc<dyn CourseStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Loader for RemainCapLoader {
    async fn load(&self, key: &str) -> Result<Option<Bytes>> {
        let Ok(course_id) = key.parse::<i64>() else {
            debug!(key, "non-numeric course key");
            return Ok(None);
        };
        Ok(self
            .store
            .remaining_cap(course_id)
            .await?
            .map(|cap| Bytes::from(cap.to_string())))
    }
}

/// `student_course`: enrollment flag for `uid_cid`, course listing for `uid`.
pub struct StudentCourseLoader {
    store: Arc<dyn CourseStore>,
}

impl StudentCourseLoader {
    pub fn new(store: Arc<dyn CourseStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Loader for StudentCourseLoader {
    async fn load(&self, key: &str) -> Result<Option<Bytes>> {
        match key.split_once('_') {
            Some((student, course)) => {
                let (Ok(student_id), Ok(course_id)) = (student.parse::<i64>(), course.parse::<i64>())
                else {
                    debug!(key, "malformed enrollment key");
                    return Ok(None);
                };
                let enrolled = self.store.has_enrollment(student_id, course_id).await?;
                Ok(enrolled.then(|| Bytes::from_static(ENROLLED)))
            }
            None => {
                let Ok(student_id) = key.parse::<i64>() else {
                    debug!(key, "non-numeric student key");
                    return Ok(None);
                };
                let courses = self.store.student_courses(student_id).await?;
                if courses.is_empty() {
                    return Ok(None);
                }
                let joined = courses
                    .iter()
                    .map(i64::to_string)
                    .collect::<Vec<_>>()
                    .join("_");
                Ok(Some(Bytes::from(joined)))
            }
        }
    }
}
