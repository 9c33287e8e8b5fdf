//! Verification orchestrator
//!
//! Runs one vendor through domain extraction, MX validation, candidate
//! generation and sequential SMTP probing. The first accepted candidate
//! wins. Every failure degrades to "try the next candidate" or "no address";
//! nothing is returned to the caller as an error.

use crate::{
    candidates::generate_candidates,
    dns::{DnsResolver, MailExchangerLookup},
    domain::{extract_domain, is_plausible_email},
    smtp_probe::{MailboxProbe, SmtpProbe},
    DiscoveryConfig, DiscoveryError, Vendor, VerificationResult,
};
use anyhow::Context;
use futures::{FutureExt, StreamExt};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Default)]
struct Counters {
    verifications: AtomicU64,
    verified: AtomicU64,
    without_website: AtomicU64,
    without_mail_exchanger: AtomicU64,
    probes: AtomicU64,
    probe_timeouts: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Counters since startup, for monitoring
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub verifications_total: u64,
    pub verified_total: u64,
    pub without_website_total: u64,
    pub without_mail_exchanger_total: u64,
    pub probes_total: u64,
    pub probe_timeouts_total: u64,
}

/// Discovers the contact address of vendors
pub struct VendorEmailDiscovery {
    config: DiscoveryConfig,
    mx_lookup: Arc<dyn MailExchangerLookup>,
    probe: Arc<dyn MailboxProbe>,
    counters: Counters,
}

impl VendorEmailDiscovery {
    /// Create the engine backed by hickory DNS and a raw TCP SMTP probe
    ///
    /// # Returns
    /// * `Ok(VendorEmailDiscovery)` on success
    /// * `Err(DiscoveryError)` if the resolver cannot be built
    pub fn new(config: DiscoveryConfig) -> Result<Self, DiscoveryError> {
        info!("Initializing vendor email discovery");

        if config.max_candidates == 0 {
            return Err(DiscoveryError::Configuration(
                "max_candidates must be at least 1".to_string(),
            ));
        }

        let resolver = DnsResolver::new(&config).context("Failed to initialize DNS resolver")?;
        let probe = SmtpProbe::from_config(&config);

        info!(
            "Vendor email discovery initialized - smtp_port: {}, candidates: {}, timeout: {:?}",
            config.smtp_port, config.max_candidates, config.per_candidate_timeout
        );

        Ok(Self::with_components(config, Arc::new(resolver), Arc::new(probe)))
    }

    /// Create the engine from explicit MX lookup and probe implementations
    pub fn with_components(
        config: DiscoveryConfig,
        mx_lookup: Arc<dyn MailExchangerLookup>,
        probe: Arc<dyn MailboxProbe>,
    ) -> Self {
        Self {
            config,
            mx_lookup,
            probe,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// First deliverable address for `vendor`, or `None`
    pub async fn verify_vendor_email(&self, vendor: &Vendor) -> Option<String> {
        self.verify(vendor).await.email
    }

    /// Full verification outcome for `vendor`
    #[instrument(skip(self, vendor), fields(vendor = %vendor.name))]
    pub async fn verify(&self, vendor: &Vendor) -> VerificationResult {
        Counters::bump(&self.counters.verifications);

        let website = vendor
            .website
            .as_deref()
            .map(str::trim)
            .filter(|website| !website.is_empty());

        let Some(website) = website else {
            debug!("Vendor has no website, nothing to verify");
            Counters::bump(&self.counters.without_website);
            return VerificationResult::unverified(vendor, None, 0);
        };

        let domain = extract_domain(website);
        debug!("Extracted domain '{}' from '{}'", domain, website);

        let exchangers = self.mx_lookup.mail_exchangers(&domain).await;
        let Some(primary) = exchangers.iter().min_by_key(|record| record.priority) else {
            info!("Domain {} has no mail exchanger, skipping SMTP probes", domain);
            Counters::bump(&self.counters.without_mail_exchanger);
            return VerificationResult::unverified(vendor, Some(domain), 0);
        };
        debug!(
            "Using mail exchanger {} (priority {}) for {}",
            primary.exchange_host, primary.priority, domain
        );

        let candidates: Vec<String> = generate_candidates(&domain)
            .into_iter()
            .take(self.config.max_candidates)
            .collect();

        let mut tried = 0;
        for (index, candidate) in candidates.iter().enumerate() {
            if !is_plausible_email(candidate) {
                warn!("Skipping malformed candidate: {}", candidate);
                continue;
            }

            tried += 1;
            if self.probe_candidate(candidate, &primary.exchange_host).await {
                info!("Verified {} after {} probe(s)", candidate, tried);
                Counters::bump(&self.counters.verified);
                return VerificationResult {
                    vendor_name: vendor.name.clone(),
                    domain: Some(domain),
                    email: Some(candidate.clone()),
                    verified: true,
                    candidates_tried: tried,
                    checked_at: SystemTime::now(),
                };
            }

            if index + 1 < candidates.len() {
                tokio::time::sleep(self.config.inter_candidate_delay).await;
            }
        }

        info!("No deliverable address found for {} after {} probe(s)", domain, tried);
        VerificationResult::unverified(vendor, Some(domain), tried)
    }

    /// Verify several vendors, at most `concurrency` at a time
    ///
    /// Results come back in input order. Each vendor still probes its
    /// candidates one at a time.
    pub async fn verify_many(
        &self,
        vendors: &[Vendor],
        concurrency: usize,
    ) -> Vec<VerificationResult> {
        debug!("Verifying {} vendors with concurrency {}", vendors.len(), concurrency);

        let pending: Vec<_> = vendors.iter().map(|vendor| self.verify(vendor)).collect();

        futures::stream::iter(pending)
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    /// One probe raced against the per-candidate cap
    ///
    /// Dropping the probe future on timeout closes its socket.
    async fn probe_candidate(&self, candidate: &str, exchange_host: &str) -> bool {
        Counters::bump(&self.counters.probes);

        let attempt = AssertUnwindSafe(self.probe.probe(
            candidate,
            exchange_host,
            self.config.probe_timeout,
        ))
        .catch_unwind();

        match tokio::time::timeout(self.config.per_candidate_timeout, attempt).await {
            Ok(Ok(deliverable)) => deliverable,
            Ok(Err(_)) => {
                warn!("Probe for {} panicked, treating as unverified", candidate);
                false
            }
            Err(_) => {
                debug!(
                    "Probe for {} exceeded {:?}, treating as unverified",
                    candidate, self.config.per_candidate_timeout
                );
                Counters::bump(&self.counters.probe_timeouts);
                false
            }
        }
    }

    /// Snapshot of the engine counters
    pub fn stats(&self) -> DiscoveryStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        DiscoveryStats {
            verifications_total: load(&self.counters.verifications),
            verified_total: load(&self.counters.verified),
            without_website_total: load(&self.counters.without_website),
            without_mail_exchanger_total: load(&self.counters.without_mail_exchanger),
            probes_total: load(&self.counters.probes),
            probe_timeouts_total: load(&self.counters.probe_timeouts),
        }
    }

    /// Clear DNS cache (for testing or administrative purposes)
    pub fn clear_dns_cache(&self) {
        self.mx_lookup.clear_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::MailExchangeRecord;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    struct StaticLookup {
        records: Vec<MailExchangeRecord>,
        calls: AtomicUsize,
        cleared: AtomicUsize,
    }

    impl StaticLookup {
        fn new(records: Vec<(&str, u16)>) -> Arc<Self> {
            Arc::new(Self {
                records: records
                    .into_iter()
                    .map(|(host, priority)| MailExchangeRecord {
                        exchange_host: host.to_string(),
                        priority,
                    })
                    .collect(),
                calls: AtomicUsize::new(0),
                cleared: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MailExchangerLookup for StaticLookup {
        async fn mail_exchangers(&self, _domain: &str) -> Vec<MailExchangeRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.records.clone()
        }

        fn clear_cache(&self) {
            self.cleared.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Accepts exactly the listed addresses and records every attempt
    struct ScriptedProbe {
        accepted: HashSet<String>,
        attempts: Mutex<Vec<(String, String, Instant)>>,
    }

    impl ScriptedProbe {
        fn accepting(accepted: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                accepted: accepted.iter().map(|s| s.to_string()).collect(),
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn attempted(&self) -> Vec<String> {
            self.attempts.lock().unwrap().iter().map(|(c, _, _)| c.clone()).collect()
        }
    }

    #[async_trait]
    impl MailboxProbe for ScriptedProbe {
        async fn probe(&self, candidate: &str, exchange_host: &str, _timeout: Duration) -> bool {
            self.attempts
                .lock()
                .unwrap()
                .push((candidate.to_string(), exchange_host.to_string(), Instant::now()));
            self.accepted.contains(candidate)
        }
    }

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Never answers; counts how many in-flight probes were torn down
    struct HangingProbe {
        started: AtomicUsize,
        dropped: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MailboxProbe for HangingProbe {
        async fn probe(&self, _candidate: &str, _exchange_host: &str, _timeout: Duration) -> bool {
            self.started.fetch_add(1, Ordering::SeqCst);
            let _connection = DropCounter(self.dropped.clone());
            std::future::pending::<()>().await;
            true
        }
    }

    struct PanickingProbe;

    #[async_trait]
    impl MailboxProbe for PanickingProbe {
        async fn probe(&self, _candidate: &str, _exchange_host: &str, _timeout: Duration) -> bool {
            panic!("socket handler exploded");
        }
    }

    fn fast_config() -> DiscoveryConfig {
        DiscoveryConfig {
            probe_timeout: Duration::from_millis(200),
            per_candidate_timeout: Duration::from_millis(100),
            inter_candidate_delay: Duration::from_millis(40),
            ..DiscoveryConfig::default()
        }
    }

    fn vendor(website: Option<&str>) -> Vendor {
        Vendor::new("Lakeside Venue", website)
    }

    #[tokio::test]
    async fn test_missing_website_makes_no_calls() {
        let lookup = StaticLookup::new(vec![("mx.example.com", 10)]);
        let probe = ScriptedProbe::accepting(&["info@example.com"]);
        let discovery =
            VendorEmailDiscovery::with_components(fast_config(), lookup.clone(), probe.clone());

        assert_eq!(discovery.verify_vendor_email(&vendor(None)).await, None);
        assert_eq!(discovery.verify_vendor_email(&vendor(Some("   "))).await, None);

        assert_eq!(lookup.calls(), 0);
        assert!(probe.attempted().is_empty());
        assert_eq!(discovery.stats().without_website_total, 2);
    }

    #[tokio::test]
    async fn test_no_mail_exchanger_skips_probing() {
        let lookup = StaticLookup::new(vec![]);
        let probe = ScriptedProbe::accepting(&["info@example.com"]);
        let discovery =
            VendorEmailDiscovery::with_components(fast_config(), lookup.clone(), probe.clone());

        let result = discovery.verify(&vendor(Some("https://www.example.com/contact"))).await;

        assert_eq!(result.email, None);
        assert!(!result.verified);
        assert_eq!(result.domain.as_deref(), Some("example.com"));
        assert_eq!(result.candidates_tried, 0);
        assert_eq!(lookup.calls(), 1);
        assert!(probe.attempted().is_empty());
        assert_eq!(discovery.stats().without_mail_exchanger_total, 1);
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let lookup = StaticLookup::new(vec![("mx.example.com", 10)]);
        let probe = ScriptedProbe::accepting(&["info@example.com", "contact@example.com"]);
        let discovery = VendorEmailDiscovery::with_components(fast_config(), lookup, probe.clone());

        let email = discovery
            .verify_vendor_email(&vendor(Some("https://www.example.com/contact")))
            .await;

        assert_eq!(email.as_deref(), Some("info@example.com"));
        assert_eq!(probe.attempted(), vec!["info@example.com"]);
    }

    #[tokio::test]
    async fn test_later_candidate_wins_in_order() {
        let lookup = StaticLookup::new(vec![("mx.example.com", 10)]);
        let probe = ScriptedProbe::accepting(&["hello@example.com", "sales@example.com"]);
        let discovery = VendorEmailDiscovery::with_components(fast_config(), lookup, probe.clone());

        let result = discovery.verify(&vendor(Some("example.com"))).await;

        assert_eq!(result.email.as_deref(), Some("hello@example.com"));
        assert!(result.verified);
        assert_eq!(result.candidates_tried, 3);
        assert_eq!(
            probe.attempted(),
            vec!["info@example.com", "contact@example.com", "hello@example.com"]
        );
    }

    #[tokio::test]
    async fn test_all_rejected_after_five_spaced_attempts() {
        let config = fast_config();
        let delay = config.inter_candidate_delay;
        let lookup = StaticLookup::new(vec![("mx.example.com", 10)]);
        let probe = ScriptedProbe::accepting(&[]);
        let discovery = VendorEmailDiscovery::with_components(config, lookup, probe.clone());

        let result = discovery.verify(&vendor(Some("http://example.com"))).await;

        assert_eq!(result.email, None);
        assert_eq!(result.candidates_tried, 5);

        let attempts = probe.attempts.lock().unwrap();
        assert_eq!(attempts.len(), 5);
        for pair in attempts.windows(2) {
            assert!(pair[1].2.duration_since(pair[0].2) >= delay);
        }
    }

    #[tokio::test]
    async fn test_probes_lowest_priority_exchanger() {
        let lookup =
            StaticLookup::new(vec![("backup.example.com", 20), ("primary.example.com", 5)]);
        let probe = ScriptedProbe::accepting(&["info@example.com"]);
        let discovery = VendorEmailDiscovery::with_components(fast_config(), lookup, probe.clone());

        discovery.verify(&vendor(Some("example.com"))).await;

        let attempts = probe.attempts.lock().unwrap();
        assert_eq!(attempts[0].1, "primary.example.com");
    }

    #[tokio::test]
    async fn test_hanging_probe_is_cut_off_and_torn_down() {
        let lookup = StaticLookup::new(vec![("mx.example.com", 10)]);
        let dropped = Arc::new(AtomicUsize::new(0));
        let probe = Arc::new(HangingProbe {
            started: AtomicUsize::new(0),
            dropped: dropped.clone(),
        });
        let discovery = VendorEmailDiscovery::with_components(fast_config(), lookup, probe.clone());

        let result = discovery.verify(&vendor(Some("example.com"))).await;

        assert_eq!(result.email, None);
        assert_eq!(probe.started.load(Ordering::SeqCst), 5);
        assert_eq!(dropped.load(Ordering::SeqCst), 5);
        assert_eq!(discovery.stats().probe_timeouts_total, 5);
    }

    #[tokio::test]
    async fn test_panicking_probe_is_contained() {
        let lookup = StaticLookup::new(vec![("mx.example.com", 10)]);
        let config = DiscoveryConfig {
            max_candidates: 2,
            ..fast_config()
        };
        let discovery =
            VendorEmailDiscovery::with_components(config, lookup, Arc::new(PanickingProbe));

        let result = discovery.verify(&vendor(Some("example.com"))).await;

        assert_eq!(result.email, None);
        assert_eq!(result.candidates_tried, 2);
    }

    #[tokio::test]
    async fn test_max_candidates_limits_probes() {
        let lookup = StaticLookup::new(vec![("mx.example.com", 10)]);
        let probe = ScriptedProbe::accepting(&["weddings@example.com"]);
        let config = DiscoveryConfig {
            max_candidates: 2,
            ..fast_config()
        };
        let discovery = VendorEmailDiscovery::with_components(config, lookup, probe.clone());

        assert_eq!(discovery.verify_vendor_email(&vendor(Some("example.com"))).await, None);
        assert_eq!(probe.attempted().len(), 2);
    }

    #[tokio::test]
    async fn test_verify_many_keeps_input_order() {
        let lookup = StaticLookup::new(vec![("mx.shared.example", 10)]);
        let probe = ScriptedProbe::accepting(&["info@alpha.example", "contact@gamma.example"]);
        let discovery = VendorEmailDiscovery::with_components(fast_config(), lookup, probe);

        let vendors = vec![
            Vendor::new("Alpha", Some("https://alpha.example")),
            Vendor::new("Beta", None),
            Vendor::new("Gamma", Some("www.gamma.example/about")),
        ];
        let results = discovery.verify_many(&vendors, 3).await;

        let emails: Vec<Option<&str>> = results.iter().map(|r| r.email.as_deref()).collect();
        assert_eq!(emails, vec![Some("info@alpha.example"), None, Some("contact@gamma.example")]);
        let names: Vec<&str> = results.iter().map(|r| r.vendor_name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);

        let stats = discovery.stats();
        assert_eq!(stats.verifications_total, 3);
        assert_eq!(stats.verified_total, 2);
        assert_eq!(stats.probes_total, 3);
    }

    #[tokio::test]
    async fn test_verify_many_runs_on_spawned_task() {
        let lookup = StaticLookup::new(vec![("mx.shared.example", 10)]);
        let probe = ScriptedProbe::accepting(&["info@delta.example"]);
        let discovery =
            Arc::new(VendorEmailDiscovery::with_components(fast_config(), lookup, probe));

        let vendors = vec![
            Vendor::new("Delta", Some("delta.example")),
            Vendor::new("Echo", None),
        ];
        let task = tokio::spawn({
            let discovery = discovery.clone();
            async move { discovery.verify_many(&vendors, 2).await }
        });

        let results = task.await.unwrap();
        let emails: Vec<Option<&str>> = results.iter().map(|r| r.email.as_deref()).collect();
        assert_eq!(emails, vec![Some("info@delta.example"), None]);
        assert_eq!(discovery.stats().verifications_total, 2);
    }

    #[tokio::test]
    async fn test_clear_dns_cache_delegates_to_lookup() {
        let lookup = StaticLookup::new(vec![]);
        let discovery = VendorEmailDiscovery::with_components(
            fast_config(),
            lookup.clone(),
            ScriptedProbe::accepting(&[]),
        );

        discovery.clear_dns_cache();
        assert_eq!(lookup.cleared.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unusable_resolver_options_rejected() {
        let config = DiscoveryConfig {
            use_system_resolver: false,
            dns_attempts: 0,
            ..DiscoveryConfig::default()
        };

        let err = VendorEmailDiscovery::new(config).err().unwrap();
        assert!(matches!(err, DiscoveryError::Internal(_)));
        assert!(err.to_string().contains("Failed to initialize DNS resolver"));
    }

    #[test]
    fn test_zero_candidates_rejected() {
        let config = DiscoveryConfig {
            max_candidates: 0,
            ..DiscoveryConfig::default()
        };
        assert!(matches!(
            VendorEmailDiscovery::new(config),
            Err(DiscoveryError::Configuration(_))
        ));
    }
}
