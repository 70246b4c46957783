//! Target URL validation for measurement submissions.
//!
//! Checks run in a fixed order and stop at the first failure: the input must
//! parse as an absolute URL, use `http` or `https`, fit in
//! [`MAX_URL_LENGTH`] characters, and (when an allow-list is configured)
//! point at a host under one of the allowed domains. Validation is pure.

use url::Url;

/// Longest accepted target URL, in characters.
pub const MAX_URL_LENGTH: usize = 2048;

/// Why a submitted URL was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlRejection {
    #[error("URL is missing")]
    Missing,

    #[error("not an absolute URL: {0}")]
    Unparseable(String),

    #[error("scheme '{0}' is not allowed (expected http or https)")]
    UnsupportedScheme(String),

    #[error("URL is {0} characters long (maximum is {MAX_URL_LENGTH})")]
    TooLong(usize),

    #[error("URL has no host")]
    MissingHost,

    #[error("host '{0}' is not in the allowed domain list")]
    DomainNotAllowed(String),
}

/// Validate a raw target URL against the fixed rules and the optional
/// domain allow-list.
///
/// An empty `allowed_domains` slice disables the domain check.
pub fn validate_target_url(raw: &str, allowed_domains: &[String]) -> Result<Url, UrlRejection> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlRejection::Missing);
    }

    let url = Url::parse(raw).map_err(|e| UrlRejection::Unparseable(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlRejection::UnsupportedScheme(other.to_string())),
    }

    let length = raw.chars().count();
    if length > MAX_URL_LENGTH {
        return Err(UrlRejection::TooLong(length));
    }

    if !allowed_domains.is_empty() {
        let host = url.host_str().ok_or(UrlRejection::MissingHost)?;
        if !allowed_domains.iter().any(|d| host_matches(host, d)) {
            return Err(UrlRejection::DomainNotAllowed(host.to_string()));
        }
    }

    Ok(url)
}

/// Suffix match on a domain-label boundary.
///
/// `example.com` matches `example.com` and `www.example.com` but not
/// `badexample.com`. An entry with a leading dot (`.example.com`) matches
/// subdomains only.
fn host_matches(host: &str, allowed: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let allowed = allowed.trim().to_ascii_lowercase();
    if allowed.is_empty() {
        return false;
    }

    if allowed.starts_with('.') {
        return host.ends_with(&allowed);
    }

    host == allowed || host.ends_with(&format!(".{allowed}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
