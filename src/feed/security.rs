//! Feed URL validation.
//!
//! Screens submitted feed URLs before any network activity: scheme and
//! host checks against private networks (SSRF), an executable-extension
//! blocklist on the path, and script-injection screens on query values.

use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;

use crate::{FeedstoreError, Result};

/// Maximum accepted URL length.
const MAX_URL_LENGTH: usize = 2048;

/// Hostname suffixes that resolve inside private networks.
const PRIVATE_DOMAIN_SUFFIXES: [&str; 9] = [
    ".local",
    ".localhost",
    ".internal",
    ".corp",
    ".home",
    ".lan",
    ".priv",
    ".test",
    ".dev",
];

/// File extensions that have no business in a feed URL path.
const BLOCKED_EXTENSIONS: [&str; 25] = [
    ".exe", ".bat", ".cmd", ".com", ".pif", ".scr", ".vbs", ".js", ".jar", ".php", ".asp",
    ".aspx", ".jsp", ".cgi", ".pl", ".py", ".rb", ".sh", ".ps1", ".psm1", ".psd1", ".wsf",
    ".wsh", ".dll", ".msi",
];

/// Script-injection screens applied to query parameter values.
static SCRIPT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"<script",
        r"javascript:",
        r"vbscript:",
        r"onload=",
        r"onerror=",
        r"eval\(",
        r"alert\(",
        r"prompt\(",
        r"confirm\(",
        r"document\.",
        r"window\.",
        r"location\.",
        r"cookie",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("script pattern must compile"))
    .collect()
});

/// Path shapes that typical RSS/Atom URLs match.
static RSS_SHAPE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)/rss",
        r"(?i)/feed",
        r"(?i)/atom",
        r"(?i)/xml",
        r"(?i)\.rss$",
        r"(?i)\.xml$",
        r"(?i)\.atom$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("feed shape pattern must compile"))
    .collect()
});

/// Validate and normalize a submitted feed URL.
///
/// Returns the normalized URL string on success. A URL whose shape does
/// not look like a feed is accepted with a warning only.
pub fn validate_feed_url(input: &str) -> Result<String> {
    if input.is_empty() {
        return Err(FeedstoreError::InvalidUrl("URL cannot be empty".to_string()));
    }

    if input.len() > MAX_URL_LENGTH {
        return Err(FeedstoreError::InvalidUrl(
            "URL length exceeds maximum allowed size".to_string(),
        ));
    }

    // Default to HTTPS when the scheme is absent.
    let candidate = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{input}")
    };

    let parsed = url::Url::parse(&candidate)
        .map_err(|e| FeedstoreError::InvalidUrl(format!("invalid URL format: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        _ => {
            return Err(FeedstoreError::InvalidUrl(
                "only HTTP and HTTPS URLs are allowed".to_string(),
            ));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| FeedstoreError::InvalidUrl("URL must have a valid host".to_string()))?;

    let private = match host {
        url::Host::Domain(domain) => is_private_hostname(domain),
        url::Host::Ipv4(ip) => is_private_ip(&IpAddr::V4(ip)),
        url::Host::Ipv6(ip) => is_private_ip(&IpAddr::V6(ip)),
    };
    if private {
        return Err(FeedstoreError::InvalidUrl(
            "access to private networks and localhost is not allowed".to_string(),
        ));
    }

    if has_blocked_extension(parsed.path()) {
        return Err(FeedstoreError::InvalidUrl(
            "URL contains suspicious file extension".to_string(),
        ));
    }

    if has_script_injection(&parsed) {
        return Err(FeedstoreError::InvalidUrl(
            "URL contains potentially malicious content".to_string(),
        ));
    }

    if !looks_like_feed_url(&parsed) {
        tracing::warn!(url = %parsed, "URL does not match typical RSS feed patterns");
    }

    Ok(parsed.to_string())
}

/// Check if a hostname points at a private network or localhost.
fn is_private_hostname(host: &str) -> bool {
    let host_lower = host.to_lowercase();

    if host_lower == "localhost" {
        return true;
    }

    PRIVATE_DOMAIN_SUFFIXES
        .iter()
        .any(|suffix| host_lower.ends_with(suffix))
}

/// Check if an IP address is private, loopback or otherwise reserved.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            if ipv4.is_loopback() || ipv4.is_unspecified() || ipv4.is_broadcast() {
                return true;
            }

            let octets = ipv4.octets();

            // Private: 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16
            if octets[0] == 10
                || (octets[0] == 172 && (16..=31).contains(&octets[1]))
                || (octets[0] == 192 && octets[1] == 168)
            {
                return true;
            }

            // Link-local: 169.254.0.0/16
            octets[0] == 169 && octets[1] == 254
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }

            let segments = ipv6.segments();

            // Unique local fc00::/7 and link-local fe80::/10
            (segments[0] & 0xfe00) == 0xfc00 || (segments[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Check the path for blocked executable/scripting extensions.
fn has_blocked_extension(path: &str) -> bool {
    let lower = path.to_lowercase();
    BLOCKED_EXTENSIONS.iter().any(|ext| lower.contains(ext))
}

/// Check query parameter values for script-injection patterns.
fn has_script_injection(url: &url::Url) -> bool {
    url.query_pairs().any(|(_, value)| {
        let lower = value.to_lowercase();
        SCRIPT_PATTERNS.iter().any(|p| p.is_match(&lower))
    })
}

/// Whether the URL path or query looks like a feed endpoint.
fn looks_like_feed_url(url: &url::Url) -> bool {
    let path = url.path().to_lowercase();
    if RSS_SHAPE_PATTERNS.iter().any(|p| p.is_match(&path)) {
        return true;
    }

    let query = url.query().unwrap_or_default().to_lowercase();
    query.contains("rss") || query.contains("feed") || query.contains("atom")
}
