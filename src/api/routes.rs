//! API Routes
//!
//! Configures the Axum router with all node endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    add_peer_handler, book_course_handler, cache_handler, health_handler, list_peers_handler,
    remove_peer_handler, schedule_handler, stats_handler, student_course_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /_cache/:group/:key` - Peer-to-peer lookup (raw bytes or 404)
/// - `POST /peers` - Add a ring member (coordinator only)
/// - `DELETE /peers` - Remove a ring member (coordinator only)
/// - `GET /peers` - Current ring membership
/// - `POST /api/v1/student/book_course` - Book a seat
/// - `GET /api/v1/student/course` - A student's enrolled courses
/// - `POST /api/v1/course/schedule` - Teacher to course assignment
/// - `GET /stats` - Per-group cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/_cache/:group/:key", get(cache_handler))
        .route(
            "/peers",
            get(list_peers_handler)
                .post(add_peer_handler)
                .delete(remove_peer_handler),
        )
        .route("/api/v1/student/book_course", post(book_course_handler))
        .route("/api/v1/student/course", get(student_course_handler))
        .route("/api/v1/course/schedule", post(schedule_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
