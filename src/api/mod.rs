//! API Module
//!
//! HTTP handlers and routing for a cache node.
//!
//! # Endpoints
//! - `GET /_cache/:group/:key` - Peer-to-peer cache protocol
//! - `POST /peers`, `DELETE /peers`, `GET /peers` - Ring membership
//! - `POST /api/v1/student/book_course` - Seat booking
//! - `GET /api/v1/student/course` - Enrolled courses
//! - `POST /api/v1/course/schedule` - Teacher to course matching
//! - `GET /stats` - Per-group cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
