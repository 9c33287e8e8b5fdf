//! Vendor Contact-Email Discovery API Server
//!
//! Finds a deliverable contact address for businesses that only publish a
//! website. Built with axum and tokio; the discovery engine lives in
//! `vendor_email_core`.

use axum::{http::HeaderValue, Router};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vendor_email_core::VendorEmailDiscovery;

mod api_handler;
mod config;
mod middleware;
mod routes;

use config::*;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub discovery: Arc<VendorEmailDiscovery>,
    pub config: Arc<AppConfig>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = load_config()?;

    // Initialize tracing/logging
    init_tracing(&config)?;

    info!("Starting Vendor Email API v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    if config.discovery.smtp_port == 25 {
        info!("SMTP probes use port 25; outbound port 25 is often blocked by hosting providers");
    }

    // Initialize discovery engine
    let discovery = VendorEmailDiscovery::new((&config.discovery).into())
        .map_err(|e| format!("Failed to initialize discovery engine: {}", e))?;

    // Create shared application state
    let app_state = AppState {
        discovery: Arc::new(discovery),
        config: Arc::new(config.clone()),
    };

    // Build the router
    let app = create_router(app_state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check available at http://{}/health", addr);
    info!("Metrics available at http://{}/metrics", addr);
    info!("Vendor verification API: http://{}/v1/vendor-email/verify", addr);
    info!("Bulk verification API: http://{}/v1/vendor-email/verify-bulk", addr);

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let security = state.config.security.clone();

    let mut router = routes::build_routes(Arc::new(state)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    if security.enable_cors {
        router = router.layer(cors_layer(&security.cors_origins));
    }

    router.layer(CompressionLayer::new())
}

/// CORS layer allowing all origins, or only the configured ones
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Load application configuration from environment and files
fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    // Start with a base configuration using defaults
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    // Try to load config file if it exists (optional)
    if std::path::Path::new("Config.toml").exists() {
        figment = figment.merge(Toml::file("Config.toml"));
    }

    // Override with environment variables, e.g. VENDOR_EMAIL_SERVER__PORT
    figment = figment.merge(Env::prefixed("VENDOR_EMAIL_").split("__"));

    let config: AppConfig = figment.extract()?;

    Ok(config)
}

/// Initialize tracing and logging
fn init_tracing(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{}={level},vendor_email_core={level},tower_http=info",
            env!("CARGO_PKG_NAME"),
            level = config.observability.log_level
        )
        .into()
    });

    if config.observability.json_logs {
        // JSON format for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        // Human-readable format for development
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()?;
    }

    info!(service = %config.observability.service_name, "Tracing initialized");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
