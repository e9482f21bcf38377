//! HTTP layer for Huddle.
//!
//! Axum-based REST API under `/api/` with bearer-token authentication,
//! envelope response format, the `/ws` live channel and `/media` file serving.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
