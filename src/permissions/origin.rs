//! Origin normalization
//!
//! Permission rules are keyed by origin (`scheme://host[:port]`), never by a
//! full URL. Wildcard forms are only accepted when storing a rule; requests
//! arriving at runtime are always reduced to one concrete origin.

use url::{Host, Url};

/// Origin pattern that matches every origin
pub const ANY_ORIGIN: &str = "*";

const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];

fn is_allowed_scheme(scheme: &str) -> bool {
    ALLOWED_SCHEMES
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(scheme))
}

/// Normalize an origin or origin pattern for storage
///
/// Accepts `*`, `<scheme>://*`, `*.<domain>`, `<scheme>://*.<domain>`, or an
/// absolute http(s) URL, which is reduced to `scheme://host[:port]`.
/// Returns `None` for anything else.
pub fn normalize_permission_origin(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if input == ANY_ORIGIN {
        return Some(ANY_ORIGIN.to_string());
    }
    if authority(input).contains('*') {
        return normalize_wildcard_origin(input);
    }
    normalize_runtime_permission_origin(input)
}

// The `host[:port]` part of an origin-like string, before any path, query or fragment
fn authority(input: &str) -> &str {
    let rest = input.split_once("://").map_or(input, |(_, rest)| rest);
    let end = rest.find(&['/', '?', '#'][..]).unwrap_or(rest.len());
    &rest[..end]
}

/// Normalize the URL of a runtime request to its exact origin
///
/// Wildcards are never accepted here.
pub fn normalize_runtime_permission_origin(url: &str) -> Option<String> {
    RuntimeOrigin::parse(url).map(|origin| origin.origin)
}

fn normalize_wildcard_origin(input: &str) -> Option<String> {
    let (scheme, rest) = match input.split_once("://") {
        Some((scheme, rest)) => {
            if !is_allowed_scheme(scheme) {
                return None;
            }
            (Some(scheme.to_ascii_lowercase()), rest)
        }
        None => (None, input),
    };

    // A lone trailing slash is an empty path; anything past it is not.
    let host = rest.strip_suffix('/').unwrap_or(rest);
    if host.contains(&['/', '?', '#', '@'][..]) {
        return None;
    }

    if host == ANY_ORIGIN {
        return scheme.map(|scheme| format!("{scheme}://*"));
    }

    let domain = normalize_wildcard_domain(host.strip_prefix("*.")?)?;
    Some(match scheme {
        Some(scheme) => format!("{scheme}://*.{domain}"),
        None => format!("*.{domain}"),
    })
}

fn normalize_wildcard_domain(domain: &str) -> Option<String> {
    let Ok(Host::Domain(domain)) = Host::parse(domain) else {
        return None;
    };
    let valid = domain.split('.').all(|label| {
        !label.is_empty()
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    });
    valid.then_some(domain)
}

/// A concrete request origin, split for wildcard matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOrigin {
    /// Serialized origin, e.g. `https://example.com:8443`
    pub origin: String,
    /// Lower-cased scheme
    pub scheme: String,
    /// Lower-cased host (IPv6 hosts keep their brackets)
    pub host: String,
}

impl RuntimeOrigin {
    /// Parse a runtime URL; `None` for wildcards, non-http(s) schemes and
    /// malformed input
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.trim();
        if authority(url).contains('*') {
            return None;
        }
        let parsed = Url::parse(url).ok()?;
        if !is_allowed_scheme(parsed.scheme()) {
            return None;
        }
        let host = parsed.host_str()?.to_string();
        if host.contains('*') {
            return None;
        }
        Some(Self {
            origin: parsed.origin().ascii_serialization(),
            scheme: parsed.scheme().to_string(),
            host,
        })
    }
}
