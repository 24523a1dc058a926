//! Traffic normalization: HAR archives and Postman collections in, a
//! filtered and deduplicated list of API calls out.
//!
//! The pipeline is:
//! 1. Detect the source format (or honour an explicit hint).
//! 2. Flatten the document into candidate [`TrafficRecord`]s.
//! 3. Drop non-API, static-asset and telemetry traffic ([`filter`]).
//! 4. Collapse records sharing an [`EndpointKey`], first occurrence wins.
//!
//! Normalization is a pure function of the input bytes.

pub mod filter;
mod har;
mod postman;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

pub use filter::{EndpointKey, Exclusion};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Errors raised when the input is neither a HAR archive nor a Postman
/// collection.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("input is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid HAR format: missing log.entries array")]
    MissingEntries,

    #[error("unsupported Postman collection version (expected schema v1 or v2)")]
    UnsupportedPostmanVersion,

    #[error("input is neither a HAR archive nor a Postman collection")]
    Unrecognized,
}

/// Input document formats understood by [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Har,
    Postman,
}

impl SourceFormat {
    /// Sniff the format of a parsed document.
    ///
    /// A Postman collection is recognised by `info.schema` mentioning
    /// postman or by a postman id; a HAR archive by its `log.entries` array.
    pub fn detect(doc: &Value) -> Result<Self, FormatError> {
        if postman::looks_like_collection(doc) {
            return Ok(Self::Postman);
        }
        if doc.pointer("/log/entries").is_some_and(Value::is_array) {
            return Ok(Self::Har);
        }
        Err(FormatError::Unrecognized)
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Har => f.write_str("har"),
            Self::Postman => f.write_str("postman"),
        }
    }
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "har" => Ok(Self::Har),
            "postman" => Ok(Self::Postman),
            other => Err(format!("unknown input format {other:?} (expected har or postman)")),
        }
    }
}

/// A single request header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// One captured HTTP exchange, immutable once produced by [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficRecord {
    /// Uppercase HTTP verb.
    pub method: String,
    /// Absolute or templated (`{{base_url}}/...`) request URL.
    pub url: String,
    pub headers: Vec<Header>,
    /// Request body, pretty-printed when it parses as JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status: Option<u16>,
    /// Response text; only retained for `application/json` responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
}

impl TrafficRecord {
    /// A bare record with no headers or bodies.
    pub fn new(method: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self {
            method: method.as_ref().trim().to_ascii_uppercase(),
            url: url.into(),
            headers: Vec::new(),
            request_body: None,
            response_status: None,
            response_body: None,
        }
    }

    /// Set a header, replacing the value of an existing header with the same
    /// name. Empty names are ignored.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if name.trim().is_empty() {
            return;
        }
        let value = value.into();
        match self.headers.iter_mut().find(|h| h.name == name) {
            Some(existing) => existing.value = value,
            None => self.headers.push(Header { name, value }),
        }
    }

    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// The deduplication identity of this record, if its URL yields a path.
    pub fn endpoint_key(&self) -> Option<EndpointKey> {
        filter::endpoint_key(&self.method, &self.url)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Parse raw HAR or Postman bytes into deduplicated API traffic records.
///
/// `hint` forces a format; otherwise it is sniffed from the document.
/// Returns an empty list (not an error) when nothing survives filtering.
pub fn normalize(raw: &[u8], hint: Option<SourceFormat>) -> Result<Vec<TrafficRecord>, FormatError> {
    let doc: Value = serde_json::from_slice(raw)?;
    let format = match hint {
        Some(format) => format,
        None => SourceFormat::detect(&doc)?,
    };

    let candidates = match format {
        SourceFormat::Har => har::records(&doc)?,
        SourceFormat::Postman => postman::records(&doc)?,
    };
    let total = candidates.len();

    let kept: Vec<TrafficRecord> = candidates
        .into_iter()
        .filter(|record| match filter::exclusion(&record.method, &record.url) {
            None => true,
            Some(reason) => {
                debug!(method = %record.method, url = %record.url, %reason, "dropping request");
                false
            }
        })
        .collect();

    let records = filter::dedup(kept);
    info!(%format, total, kept = records.len(), "normalized captured traffic");
    Ok(records)
}

/// Pretty-print a body when it is JSON; keep it verbatim otherwise. Blank
/// bodies are dropped.
pub(crate) fn tidy_body(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(value) => serde_json::to_string_pretty(&value).ok(),
        Err(_) => Some(text.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn har(entries: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({ "log": { "version": "1.2", "entries": entries } })).unwrap()
    }

    fn entry(method: &str, url: &str) -> Value {
        json!({
            "request": { "method": method, "url": url, "headers": [] },
            "response": { "status": 200, "content": { "mimeType": "application/json", "text": "{}" } }
        })
    }

    #[test]
    fn duplicate_get_collapses_to_one_record() {
        let raw = har(json!([
            entry("GET", "https://example.com/api/users"),
            entry("GET", "https://example.com/api/users?page=2"),
        ]));
        let records = normalize(&raw, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://example.com/api/users");
    }

    #[test]
    fn static_asset_only_yields_nothing() {
        let raw = har(json!([entry("GET", "https://example.com/static/app.js")]));
        assert!(normalize(&raw, None).unwrap().is_empty());
    }

    #[test]
    fn normalization_is_deterministic() {
        let raw = har(json!([
            entry("POST", "https://example.com/api/orders"),
            entry("GET", "https://example.com/api/orders"),
            entry("DELETE", "https://example.com/api/orders/1"),
        ]));
        assert_eq!(normalize(&raw, None).unwrap(), normalize(&raw, None).unwrap());
    }

    #[test]
    fn malformed_json_is_a_format_error() {
        let err = normalize(b"{not json", None).unwrap_err();
        assert!(matches!(err, FormatError::InvalidJson(_)));
    }

    #[test]
    fn unknown_document_is_unrecognized() {
        let err = normalize(br#"{"hello": "world"}"#, None).unwrap_err();
        assert!(matches!(err, FormatError::Unrecognized));
    }

    #[test]
    fn har_hint_on_non_har_reports_missing_entries() {
        let err = normalize(br#"{"log": {}}"#, Some(SourceFormat::Har)).unwrap_err();
        assert!(matches!(err, FormatError::MissingEntries));
    }

    #[test]
    fn detect_prefers_postman_marker() {
        let doc = json!({ "info": { "schema": "https://schema.getpostman.com/json/collection/v2.1.0/collection.json" }, "item": [] });
        assert_eq!(SourceFormat::detect(&doc).unwrap(), SourceFormat::Postman);
    }

    #[test]
    fn set_header_overwrites_existing_name() {
        let mut record = TrafficRecord::new("get", "https://example.com/api");
        record.set_header("Accept", "text/plain");
        record.set_header("Accept", "application/json");
        record.set_header("", "ignored");
        assert_eq!(record.method, "GET");
        assert_eq!(record.headers.len(), 1);
        assert_eq!(record.header("accept"), Some("application/json"));
    }

    #[test]
    fn tidy_body_pretty_prints_json() {
        assert_eq!(tidy_body(r#"{"a":1}"#).unwrap(), "{\n  \"a\": 1\n}");
        assert_eq!(tidy_body("a=1&b=2").unwrap(), "a=1&b=2");
        assert_eq!(tidy_body("   "), None);
    }

    #[test]
    fn source_format_parses_from_str() {
        assert_eq!("HAR".parse::<SourceFormat>().unwrap(), SourceFormat::Har);
        assert_eq!("postman".parse::<SourceFormat>().unwrap(), SourceFormat::Postman);
        assert!("curl".parse::<SourceFormat>().is_err());
    }
}
