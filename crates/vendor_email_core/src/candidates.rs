//! Candidate mailbox generation
//!
//! Businesses without a published address usually still run one of a small
//! set of role mailboxes. The list below is tried top to bottom.

/// Role mailboxes in probing order
pub const LOCAL_PARTS: [&str; 20] = [
    "info",
    "contact",
    "hello",
    "inquiries",
    "sales",
    "events",
    "weddings",
    "bookings",
    "reservations",
    "venue",
    "catering",
    "florist",
    "photography",
    "dj",
    "music",
    "planning",
    "coordination",
    "admin",
    "office",
    "reception",
];

/// Build every candidate address for `domain`, in probing order
///
/// # Example
/// ```rust
/// use vendor_email_core::generate_candidates;
///
/// let candidates = generate_candidates("example.com");
/// assert_eq!(candidates[0], "info@example.com");
/// assert_eq!(candidates.len(), 20);
/// ```
pub fn generate_candidates(domain: &str) -> Vec<String> {
    LOCAL_PARTS
        .iter()
        .map(|local| format!("{}@{}", local, domain))
        .collect()
}
