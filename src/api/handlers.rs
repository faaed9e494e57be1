//! API Handlers
//!
//! HTTP request handlers for the peer protocol, ring membership and the
//! enrollment endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::booking::BookingCoordinator;
use crate::cache::{CacheManager, GetOptions, LookupStrategy};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::db::CourseStore;
use crate::error::{CacheError, Result};
use crate::models::{
    BookCourseRequest, BookCourseResponse, HealthResponse, PeerRequest, PeersResponse,
    ScheduleRequest, ScheduleResponse, StatsResponse, StudentCourseQuery, StudentCourseResponse,
};
use crate::peer::PeerPool;
use crate::scheduler;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub manager: Arc<CacheManager>,
    pub peers: Arc<PeerPool>,
    pub booking: Arc<BookingCoordinator>,
}

impl AppState {
    /// Wires the peer pool, cache groups and booking coordinator for one node.
    ///
    /// Every named group is registered before returning so that peers can be
    /// served before this node reads anything itself.
    pub async fn from_config(config: Config, store: Arc<dyn CourseStore>) -> Result<Self> {
        let peers = Arc::new(PeerPool::new(&config.self_host, config.hash_replicas)?);
        let manager = Arc::new(CacheManager::with_peers(peers.clone()));
        let catalog = Catalog::new(manager.clone(), store, &config);
        catalog.register_all().await;
        let booking = Arc::new(BookingCoordinator::new(catalog, config.booking_cap_ttl));

        Ok(Self {
            config: Arc::new(config),
            manager,
            peers,
            booking,
        })
    }

    fn require_coordinator(&self) -> Result<()> {
        if self.config.is_coordinator() {
            Ok(())
        } else {
            Err(CacheError::PermissionDenied(format!(
                "ring membership is managed by {}",
                self.config.main_host
            )))
        }
    }
}

/// Handler for GET /_cache/:group/:key
///
/// Serves a peer's lookup from this node's local store or loader. Never
/// forwards to another peer.
pub async fn cache_handler(
    State(state): State<AppState>,
    Path((group, key)): Path<(String, String)>,
) -> Result<Response> {
    let group = state
        .manager
        .group(&group)
        .await
        .ok_or_else(|| CacheError::NotFound(format!("no such group: {}", group)))?;

    match group
        .get(&key, GetOptions::new(LookupStrategy::LocalThenGetter))
        .await?
    {
        Some(bytes) => Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response()),
        None => Err(CacheError::NotFound(format!("key not found: {}", key))),
    }
}

/// Handler for POST /peers
pub async fn add_peer_handler(
    State(state): State<AppState>,
    Json(req): Json<PeerRequest>,
) -> Result<Json<PeersResponse>> {
    state.require_coordinator()?;
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.peers.add_peer(&req.host);
    let hosts = state.peers.peers();
    info!(peer = %req.host, peers = ?hosts, "peer registered");
    Ok(Json(PeersResponse::new(hosts)))
}

/// Handler for DELETE /peers
///
/// Responds with the members left on the ring.
pub async fn remove_peer_handler(
    State(state): State<AppState>,
    Json(req): Json<PeerRequest>,
) -> Result<Json<PeersResponse>> {
    state.require_coordinator()?;
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let remaining = state.peers.remove_peer(&req.host)?;
    info!(peer = %req.host, remaining = ?remaining, "peer unregistered");
    Ok(Json(PeersResponse::new(remaining)))
}

/// Handler for GET /peers
pub async fn list_peers_handler(State(state): State<AppState>) -> Json<PeersResponse> {
    Json(PeersResponse::new(state.peers.peers()))
}

/// Handler for POST /api/v1/student/book_course
///
/// Every decided outcome is a 200; only store failures are errors.
pub async fn book_course_handler(
    State(state): State<AppState>,
    Json(req): Json<BookCourseRequest>,
) -> Result<Json<BookCourseResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let outcome = state.booking.book_course(req.user_id, req.course_id).await?;
    Ok(Json(BookCourseResponse::new(outcome)))
}

/// Handler for GET /api/v1/student/course?user_id=
pub async fn student_course_handler(
    State(state): State<AppState>,
    Query(query): Query<StudentCourseQuery>,
) -> Result<Json<StudentCourseResponse>> {
    let course_list = state.booking.student_courses(query.user_id).await?;
    Ok(Json(StudentCourseResponse {
        user_id: query.user_id,
        course_list,
    }))
}

/// Handler for POST /api/v1/course/schedule
pub async fn schedule_handler(
    Json(ScheduleRequest(qualifications)): Json<ScheduleRequest>,
) -> Json<ScheduleResponse> {
    Json(ScheduleResponse {
        assignments: scheduler::schedule(&qualifications),
    })
}

/// Handler for GET /stats
///
/// Returns per-group cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.manager.stats().await;
    Json(StatsResponse::new(state.peers.self_host(), &stats))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
