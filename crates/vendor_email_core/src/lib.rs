//! # vendor_email_core
//!
//! Contact-email discovery for businesses that publish a website but no
//! contact address.
//!
//! ## Features
//!
//! - **Domain extraction** from arbitrary website URLs
//! - **MX validation** via hickory-resolver, with the resolver's own caching
//! - **Candidate generation** from a fixed, ordered list of business mailboxes
//! - **Non-delivering SMTP probe** that stops after `RCPT TO`
//! - **Sequential orchestration** with per-candidate timeouts and a polite
//!   delay between attempts
//!
//! ## Example
//!
//! ```rust,no_run
//! use vendor_email_core::{DiscoveryConfig, Vendor, VendorEmailDiscovery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let discovery = VendorEmailDiscovery::new(DiscoveryConfig::default())?;
//!
//!     let vendor = Vendor::new("Rosewood Florals", Some("https://www.rosewood.example/about"));
//!     match discovery.verify_vendor_email(&vendor).await {
//!         Some(email) => println!("Verified contact: {}", email),
//!         None => println!("No deliverable address found"),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod candidates;
pub mod discovery;
pub mod dns;
pub mod domain;
pub mod smtp_probe;

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Configuration for the discovery engine
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// DNS resolver timeout in milliseconds
    pub dns_timeout_ms: u64,
    /// Maximum number of DNS lookup attempts
    pub dns_attempts: usize,
    /// DNS cache size (number of entries)
    pub dns_cache_size: usize,
    /// Minimum TTL for positive DNS cache entries
    pub dns_min_ttl_secs: u64,
    /// Read the operating system resolver configuration instead of public resolvers
    pub use_system_resolver: bool,
    /// TCP port the SMTP probe connects to
    pub smtp_port: u16,
    /// Socket-level timeout for one whole SMTP probe
    pub probe_timeout: Duration,
    /// Outer cap on each probe attempt, raced by the orchestrator
    pub per_candidate_timeout: Duration,
    /// Pause after a rejected candidate before trying the next one
    pub inter_candidate_delay: Duration,
    /// Number of generated candidates actually probed
    pub max_candidates: usize,
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
            probe_timeout: Duration::from_secs(10),
            per_candidate_timeout: Duration::from_secs(5),
            inter_candidate_delay: Duration::from_millis(500),
            max_candidates: 5,
        }
    }
}

/// A business whose contact address should be discovered
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vendor {
    pub name: String,
    pub website: Option<String>,
}

impl Vendor {
    pub fn new(name: impl Into<String>, website: Option<&str>) -> Self {
        Self {
            name: name.into(),
            website: website.map(str::to_string),
        }
    }
}

/// Outcome of verifying one vendor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Vendor name, echoed for correlation
    pub vendor_name: String,
    /// Domain extracted from the website, if there was one
    pub domain: Option<String>,
    /// First address the mail exchanger accepted
    pub email: Option<String>,
    /// Whether `email` was accepted by a live probe
    pub verified: bool,
    /// Number of SMTP probes attempted
    pub candidates_tried: usize,
    /// Timestamp when verification finished
    pub checked_at: SystemTime,
}

impl VerificationResult {
    pub(crate) fn unverified(
        vendor: &Vendor,
        domain: Option<String>,
        candidates_tried: usize,
    ) -> Self {
        Self {
            vendor_name: vendor.name.clone(),
            domain,
            email: None,
            verified: false,
            candidates_tried,
            checked_at: SystemTime::now(),
        }
    }
}

/// Errors raised while building the discovery engine
///
/// Verification itself never fails; these only surface during setup.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

pub use candidates::generate_candidates;
pub use discovery::{DiscoveryStats, VendorEmailDiscovery};
pub use dns::{DnsResolver, MailExchangeRecord, MailExchangerLookup};
pub use domain::extract_domain;
pub use smtp_probe::{MailboxProbe, SmtpProbe};
