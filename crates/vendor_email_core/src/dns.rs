//! MX resolution using hickory-resolver
//!
//! Answers one question for the orchestrator: which hosts accept mail for a
//! domain, in preference order. Every failure collapses to "none".

use crate::DiscoveryConfig;
use async_trait::async_trait;
use hickory_resolver::{
    config::{ResolverConfig, ResolverOpts},
    system_conf, TokioAsyncResolver,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One MX entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailExchangeRecord {
    /// Exchange hostname without the trailing root dot
    pub exchange_host: String,
    /// MX preference; lower is preferred
    pub priority: u16,
}

/// Source of MX records for a domain
#[async_trait]
pub trait MailExchangerLookup: Send + Sync {
    /// MX records sorted ascending by priority, empty on any failure
    async fn mail_exchangers(&self, domain: &str) -> Vec<MailExchangeRecord>;

    /// Whether the domain is configured to receive mail
    async fn has_mail_exchanger(&self, domain: &str) -> bool {
        !self.mail_exchangers(domain).await.is_empty()
    }

    /// Drop any cached answers
    fn clear_cache(&self) {}
}

/// Stable ascending sort by MX priority
pub fn sort_by_priority(records: &mut [MailExchangeRecord]) {
    records.sort_by_key(|record| record.priority);
}

/// DNS resolver wrapper used in production
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
}

impl DnsResolver {
    /// Create a resolver from the discovery settings
    ///
    /// Uses the operating system's resolver configuration when
    /// `use_system_resolver` is set and readable, Cloudflare otherwise.
    pub fn new(config: &DiscoveryConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(config.dns_timeout_ms > 0, "dns_timeout_ms must be greater than zero");
        anyhow::ensure!(config.dns_attempts > 0, "dns_attempts must be at least 1");

        let (resolver_config, mut opts) = if config.use_system_resolver {
            match system_conf::read_system_conf() {
                Ok((resolver_config, _)) if resolver_config.name_servers().is_empty() => {
                    warn!("System resolver configuration lists no name servers, using Cloudflare");
                    (ResolverConfig::cloudflare(), ResolverOpts::default())
                }
                Ok((resolver_config, opts)) => {
                    info!("Initializing DNS resolver from system configuration");
                    (resolver_config, opts)
                }
                Err(e) => {
                    warn!("Could not read system resolver configuration, using Cloudflare: {}", e);
                    (ResolverConfig::cloudflare(), ResolverOpts::default())
                }
            }
        } else {
            info!("Initializing DNS resolver with Cloudflare DNS");
            (ResolverConfig::cloudflare(), ResolverOpts::default())
        };

        opts.timeout = Duration::from_millis(config.dns_timeout_ms);
        opts.attempts = config.dns_attempts;
        opts.cache_size = config.dns_cache_size;
        opts.positive_min_ttl = Some(Duration::from_secs(config.dns_min_ttl_secs));
        opts.negative_min_ttl = Some(Duration::from_secs(30));
        opts.positive_max_ttl = Some(Duration::from_secs(3600));

        let resolver = TokioAsyncResolver::tokio(resolver_config, opts);

        info!(
            "DNS resolver initialized - timeout: {}ms, attempts: {}, cache_size: {}",
            config.dns_timeout_ms, config.dns_attempts, config.dns_cache_size
        );

        Ok(Self { resolver })
    }
}

#[async_trait]
impl MailExchangerLookup for DnsResolver {
    async fn mail_exchangers(&self, domain: &str) -> Vec<MailExchangeRecord> {
        if domain.is_empty() {
            debug!("Skipping MX lookup for empty domain");
            return Vec::new();
        }

        debug!("Querying MX records for domain: {}", domain);

        match self.resolver.mx_lookup(domain).await {
            Ok(response) => {
                let mut records: Vec<MailExchangeRecord> = response
                    .iter()
                    .map(|mx| MailExchangeRecord {
                        exchange_host: mx.exchange().to_utf8().trim_end_matches('.').to_string(),
                        priority: mx.preference(),
                    })
                    .filter(|record| !record.exchange_host.is_empty())
                    .collect();
                sort_by_priority(&mut records);

                debug!("Domain {} has {} MX record(s)", domain, records.len());
                records
            }
            Err(e) => {
                debug!("MX record lookup failed for {}: {}", domain, e);
                Vec::new()
            }
        }
    }

    fn clear_cache(&self) {
        self.resolver.clear_cache();
        info!("DNS cache cleared");
    }
}
