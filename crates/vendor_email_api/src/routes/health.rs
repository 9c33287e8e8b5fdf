//! Health check and monitoring routes
//!
//! This module contains endpoints for service health checks, readiness probes,
//! and monitoring metrics.

use crate::{api_handler::format_timestamp, AppState};
use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::info;
use vendor_email_core::DiscoveryStats;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint - GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: format_timestamp(SystemTime::now()),
    })
}

/// Readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub smtp_port: u16,
    pub timestamp: String,
}

/// Readiness check endpoint - GET /ready
///
/// The engine is built before the listener binds, so a running server is
/// ready. Reports the SMTP port so deployments can spot a blocked port 25.
pub async fn ready_handler(State(state): State<Arc<AppState>>) -> Json<ReadinessResponse> {
    Json(ReadinessResponse {
        ready: true,
        smtp_port: state.discovery.config().smtp_port,
        timestamp: format_timestamp(SystemTime::now()),
    })
}

/// Render counters in Prometheus text exposition format
pub fn render_metrics(namespace: &str, stats: &DiscoveryStats) -> String {
    let counters = [
        ("verifications_total", "Vendors submitted for verification", stats.verifications_total),
        ("verified_total", "Vendors with a verified contact address", stats.verified_total),
        (
            "without_website_total",
            "Vendors skipped for lack of a website",
            stats.without_website_total,
        ),
        (
            "without_mail_exchanger_total",
            "Vendors whose domain has no MX record",
            stats.without_mail_exchanger_total,
        ),
        ("probes_total", "SMTP probes attempted", stats.probes_total),
        (
            "probe_timeouts_total",
            "SMTP probes cut off by the per-candidate timeout",
            stats.probe_timeouts_total,
        ),
    ];

    let mut out = String::new();
    for (name, help, value) in counters {
        let _ = writeln!(out, "# HELP {namespace}_{name} {help}");
        let _ = writeln!(out, "# TYPE {namespace}_{name} counter");
        let _ = writeln!(out, "{namespace}_{name} {value}");
        out.push('\n');
    }

    let _ = writeln!(out, "# HELP {namespace}_build_info Build information");
    let _ = writeln!(out, "# TYPE {namespace}_build_info gauge");
    let _ = writeln!(out, "{namespace}_build_info{{version=\"{}\"}} 1", env!("CARGO_PKG_VERSION"));

    out
}

/// Metrics endpoint - GET /metrics
///
/// Returns Prometheus-compatible metrics for monitoring.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> (StatusCode, String) {
    let stats = state.discovery.stats();
    let metrics = render_metrics(&state.config.observability.metrics_namespace, &stats);

    (StatusCode::OK, metrics)
}

/// Statistics response
#[derive(Serialize)]
pub struct StatsResponse {
    pub version: String,
    pub discovery_stats: DiscoveryStats,
    pub timestamp: String,
}

/// Statistics endpoint - GET /admin/stats
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        discovery_stats: state.discovery.stats(),
        timestamp: format_timestamp(SystemTime::now()),
    })
}

/// Cache response
#[derive(Serialize)]
pub struct CacheResponse {
    pub message: String,
    pub timestamp: String,
}

/// Cache clearing endpoint - POST /admin/cache/clear
///
/// Clears the DNS cache for administrative purposes.
pub async fn clear_cache_handler(State(state): State<Arc<AppState>>) -> Json<CacheResponse> {
    state.discovery.clear_dns_cache();

    info!("DNS cache cleared by admin request");

    Json(CacheResponse {
        message: "DNS cache cleared successfully".to_string(),
        timestamp: format_timestamp(SystemTime::now()),
    })
}
