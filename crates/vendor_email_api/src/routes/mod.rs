//! API Routes Module
//!
//! This module organizes all HTTP endpoints into logical groups:
//! - `verify`: Single-vendor contact email discovery
//! - `bulk_verify`: Concurrent discovery across several vendors
//! - `health`: Health checks, metrics and administrative endpoints

pub mod bulk_verify;
pub mod health;
pub mod verify;

use crate::{
    middleware::{request_context, request_size_limiter, security_headers},
    AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build all API routes and return a configured Router
///
/// Request-size, request-id and security-header middleware are applied here
/// so they cover every route.
pub fn build_routes(state: Arc<AppState>) -> Router {
    let max_body_size = state.config.security.max_body_size_bytes;

    Router::new()
        // Discovery endpoints
        .route("/v1/vendor-email/verify", post(verify::verify_vendor_handler))
        .route("/v1/vendor-email/verify-bulk", post(bulk_verify::verify_bulk_handler))

        // Health and monitoring endpoints
        .route("/health", get(health::health_handler))
        .route("/ready", get(health::ready_handler))
        .route("/metrics", get(health::metrics_handler))

        // Administrative endpoints
        .route("/admin/stats", get(health::stats_handler))
        .route("/admin/cache/clear", post(health::clear_cache_handler))

        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(from_fn_with_state(state.clone(), request_size_limiter))
        .layer(from_fn(request_context))
        .layer(from_fn(security_headers))

        // Apply shared state to all routes
        .with_state(state)
}
