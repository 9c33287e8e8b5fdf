//! Configuration management for the vendor email API
//!
//! This module handles loading configuration from environment variables
//! and configuration files using the figment crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub discovery: DiscoveryConfig,
    pub observability: ObservabilityConfig,
    pub security: SecurityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Discovery engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// DNS resolver timeout in milliseconds
    pub dns_timeout_ms: u64,
    /// Maximum number of DNS lookup attempts
    pub dns_attempts: usize,
    /// DNS cache size (number of entries)
    pub dns_cache_size: usize,
    /// Minimum TTL for positive DNS cache entries in seconds
    pub dns_min_ttl_secs: u64,
    /// Use /etc/resolv.conf (or platform equivalent) instead of Cloudflare
    pub use_system_resolver: bool,
    /// SMTP port probed on the mail exchanger
    pub smtp_port: u16,
    /// Socket-level timeout for one probe in milliseconds
    pub probe_timeout_ms: u64,
    /// Hard cap per candidate in milliseconds
    pub per_candidate_timeout_ms: u64,
    /// Delay between rejected candidates in milliseconds
    pub inter_candidate_delay_ms: u64,
    /// Candidates probed per vendor
    pub max_candidates: usize,
    /// Vendors verified concurrently by the bulk endpoint
    pub bulk_concurrency: usize,
    /// Largest accepted bulk request
    pub max_bulk_vendors: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            dns_timeout_ms: 2000,
            dns_attempts: 2,
            dns_cache_size: 10_000,
            dns_min_ttl_secs: 60,
            use_system_resolver: true,
            smtp_port: 25,
            probe_timeout_ms: 10_000,
            per_candidate_timeout_ms: 5_000,
            inter_candidate_delay_ms: 500,
            max_candidates: 5,
            bulk_concurrency: 4,
            max_bulk_vendors: 50,
        }
    }
}

impl From<&DiscoveryConfig> for vendor_email_core::DiscoveryConfig {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            dns_timeout_ms: config.dns_timeout_ms,
            dns_attempts: config.dns_attempts,
            dns_cache_size: config.dns_cache_size,
            dns_min_ttl_secs: config.dns_min_ttl_secs,
            use_system_resolver: config.use_system_resolver,
            smtp_port: config.smtp_port,
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
            per_candidate_timeout: Duration::from_millis(config.per_candidate_timeout_ms),
            inter_candidate_delay: Duration::from_millis(config.inter_candidate_delay_ms),
            max_candidates: config.max_candidates,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable JSON structured logging
    pub json_logs: bool,
    /// Log level filter, used when RUST_LOG is unset
    pub log_level: String,
    /// Service name reported in logs
    pub service_name: String,
    /// Metrics namespace
    pub metrics_namespace: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            log_level: "info".to_string(),
            service_name: "vendor-email-api".to_string(),
            metrics_namespace: "vendor_email".to_string(),
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes
    pub max_body_size_bytes: usize,
    /// Enable CORS
    pub enable_cors: bool,
    /// Allowed CORS origins (empty = allow all)
    pub cors_origins: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size_bytes: 64 * 1024,
            enable_cors: true,
            cors_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.discovery.smtp_port, 25);
        assert!(!config.observability.json_logs);
        assert!(config.security.enable_cors);
    }

    #[test]
    fn test_discovery_defaults_match_engine_defaults() {
        let core: vendor_email_core::DiscoveryConfig = (&DiscoveryConfig::default()).into();
        let engine = vendor_email_core::DiscoveryConfig::default();

        assert_eq!(core.per_candidate_timeout, Duration::from_secs(5));
        assert_eq!(core.inter_candidate_delay, Duration::from_millis(500));
        assert_eq!(core.probe_timeout, engine.probe_timeout);
        assert_eq!(core.max_candidates, engine.max_candidates);
        assert_eq!(core.smtp_port, engine.smtp_port);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(
                r#"
                [server]
                port = 8080

                [discovery]
                inter_candidate_delay_ms = 50
                bulk_concurrency = 8
                "#,
            ))
            .extract()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.discovery.inter_candidate_delay_ms, 50);
        assert_eq!(config.discovery.bulk_concurrency, 8);
        assert_eq!(config.discovery.max_candidates, 5);
        assert_eq!(config.observability.service_name, "vendor-email-api");
    }
}
