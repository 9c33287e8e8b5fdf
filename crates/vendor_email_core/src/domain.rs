//! Website-to-domain normalization and the permissive address check

use regex::Regex;
use std::sync::LazyLock;

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email shape pattern is valid")
});

/// Reduce a website URL to a bare domain
///
/// Strips a leading `http://` or `https://` (any case), everything from the
/// first `/` onward, then a leading `www.`. Malformed input is passed through
/// and simply fails the MX lookup later.
///
/// # Example
/// ```rust
/// use vendor_email_core::extract_domain;
///
/// assert_eq!(extract_domain("https://www.example.com/contact"), "example.com");
/// ```
pub fn extract_domain(website: &str) -> String {
    let without_scheme = strip_prefix_ignore_case(website, "https://")
        .or_else(|| strip_prefix_ignore_case(website, "http://"))
        .unwrap_or(website);

    let host = without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme);

    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// `local@domain.tld` shape check, nothing stricter
pub fn is_plausible_email(candidate: &str) -> bool {
    EMAIL_SHAPE.is_match(candidate)
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}
