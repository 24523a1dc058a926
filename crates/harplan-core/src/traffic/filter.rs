//! Request filtering and endpoint deduplication.
//!
//! A request survives when it uses one of the supported verbs, does not
//! fetch a static asset, is not aimed at an analytics/tracking/CDN host,
//! and has a path that looks like an API call. Template URLs such as
//! `{{base_url}}/users` are accepted without resolving the placeholder.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use url::Url;

use super::TrafficRecord;

/// Verbs we generate tests for.
pub const ALLOWED_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE"];

/// Path suffixes that mark static assets.
pub const STATIC_EXTENSIONS: &[&str] = &[
    ".js", ".css", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".woff", ".woff2", ".ttf",
    ".eot", ".map", ".json", ".html", ".htm",
];

/// Host fragments of analytics, tracking and CDN services. Matched as
/// case-insensitive substrings of the request host.
pub const DENIED_HOSTS: &[&str] = &[
    // Google
    "google-analytics.com",
    "analytics.google.com",
    "googletagmanager.com",
    "g.doubleclick.net",
    "pagead2.googlesyndication.com",
    "adservice.google.com",
    // Meta
    "facebook.com",
    "connect.facebook.net",
    // LinkedIn / Twitter
    "snap.licdn.com",
    "ads.linkedin.com",
    "analytics.twitter.com",
    "ads-twitter.com",
    // Session replay and product analytics
    "clarity.ms",
    "hotjar.com",
    "mixpanel.com",
    "cdn.mxpnl.com",
    "segment.com",
    "api.segment.io",
    "crazyegg.com",
    "hubspot.com",
    "omtrdc.net",
    "adobe.io",
    "kissmetrics.io",
    "trk.kissmetrics.com",
    "quantserve.com",
    "amplitude.com",
    "cloudflareinsights.com",
    "newrelic.com",
    "datadoghq.com",
    "logrocket.io",
    // Hosted storefront / site builders
    "shopify.com",
    "wix.com",
    "static.parastorage.com",
    // Open source analytics
    "plausible.io",
    "matomo.cloud",
    "simpleanalyticscdn.com",
    // Generic
    "analytics",
    "tracking",
    "cdn.",
    "fonts.",
    "google.com",
];

/// Stand-in origin used to parse templated URLs.
const PLACEHOLDER_ORIGIN: &str = "https://placeholder-domain.com";

static TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*\w+\s*\}\}").expect("valid template regex"));

static VERSIONED_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/v([1-9][0-9]{0,2}|1000)/").expect("valid version regex"));

static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?([^/?]+)?(/[^?#]*)?").expect("valid path regex")
});

// ---------------------------------------------------------------------------
// Exclusion
// ---------------------------------------------------------------------------

/// Why a request was filtered out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    InvalidUrl,
    Method,
    StaticAsset,
    DeniedHost,
    NotApiPath,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InvalidUrl => "invalid url",
            Self::Method => "unsupported method",
            Self::StaticAsset => "static asset",
            Self::DeniedHost => "denied host",
            Self::NotApiPath => "not an api path",
        };
        f.write_str(text)
    }
}

/// Whether `url` contains a `{{placeholder}}`.
pub fn is_template(url: &str) -> bool {
    TEMPLATE_RE.is_match(url)
}

/// A URL is valid when it is templated or parses as absolute http(s).
pub fn is_valid_url(url: &str) -> bool {
    if is_template(url) {
        return true;
    }
    Url::parse(url).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Return the reason a request should be dropped, or `None` to keep it.
pub fn exclusion(method: &str, url: &str) -> Option<Exclusion> {
    if !is_valid_url(url) {
        return Some(Exclusion::InvalidUrl);
    }

    let parsed = if is_template(url) {
        Url::parse(&TEMPLATE_RE.replace(url, PLACEHOLDER_ORIGIN))
    } else {
        Url::parse(url)
    };
    let Ok(parsed) = parsed else {
        return Some(Exclusion::InvalidUrl);
    };

    if !ALLOWED_METHODS.contains(&method.to_ascii_uppercase().as_str()) {
        return Some(Exclusion::Method);
    }

    let path = parsed.path().to_ascii_lowercase();
    if STATIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return Some(Exclusion::StaticAsset);
    }

    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    if DENIED_HOSTS.iter().any(|denied| host.contains(denied)) {
        return Some(Exclusion::DeniedHost);
    }

    if !looks_like_api_path(parsed.path()) {
        return Some(Exclusion::NotApiPath);
    }

    None
}

/// Heuristic for "this path is an API call".
///
/// Any rooted path qualifies, so in practice this only rejects paths that
/// lost their leading slash; the named markers document what we expect.
pub fn looks_like_api_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.contains("/api/")
        || VERSIONED_PATH_RE.is_match(&lower)
        || lower.contains("/rest/")
        || lower.contains("/graphql")
        || lower.starts_with("/services/")
        || lower.starts_with('/')
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

/// `(method, origin + path)` identity used to collapse duplicate requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey {
    pub method: String,
    pub path: String,
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Compute the dedup key for a request.
///
/// Absolute URLs key on origin plus pathname (query and fragment ignored).
/// Templated or relative URLs fall back to the path component, with the
/// placeholder kept as a literal. Returns `None` when no path can be found.
pub fn endpoint_key(method: &str, url: &str) -> Option<EndpointKey> {
    let method = method.to_ascii_uppercase();
    if let Ok(parsed) = Url::parse(url) {
        if parsed.has_host() {
            let origin = parsed.origin().ascii_serialization();
            return Some(EndpointKey {
                method,
                path: format!("{origin}{}", parsed.path()),
            });
        }
    }
    let captures = PATH_RE.captures(url)?;
    let path = captures.get(2)?.as_str();
    Some(EndpointKey {
        method,
        path: path.to_string(),
    })
}

/// Keep the first record for each [`EndpointKey`], preserving order.
/// Records whose URL yields no key are skipped.
pub fn dedup(records: Vec<TrafficRecord>) -> Vec<TrafficRecord> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(records.len());
    for record in records {
        match record.endpoint_key() {
            Some(key) => {
                if seen.insert(key) {
                    unique.push(record);
                }
            }
            None => warn!(url = %record.url, "skipping request with unrecognized url"),
        }
    }
    unique
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
