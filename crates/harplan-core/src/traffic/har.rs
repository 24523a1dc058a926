//! HAR 1.2 archive flattening.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{FormatError, TrafficRecord, tidy_body};
use crate::plan::lenient;

/// Browser-generated headers that carry no meaning for API tests.
const NOISE_HEADERS: &[&str] = &[
    ":authority",
    ":method",
    ":path",
    ":scheme",
    "accept-language",
    "accept-encoding",
    "cache-control",
    "content-length",
    "connection",
    "cookie",
    "origin",
    "pragma",
    "referer",
    "sec-ch-ua",
    "sec-ch-ua-mobile",
    "sec-ch-ua-platform",
    "sec-fetch-dest",
    "sec-fetch-mode",
    "sec-fetch-site",
    "sec-fetch-user",
    "upgrade-insecure-requests",
    "user-agent",
    "x-requested-with",
];

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default, deserialize_with = "lenient::or_default")]
    request: Option<Request>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    response: Option<Response>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Request {
    #[serde(deserialize_with = "lenient::opt_string")]
    method: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    url: Option<String>,
    #[serde(deserialize_with = "lenient::seq")]
    headers: Vec<NameValue>,
    #[serde(deserialize_with = "lenient::or_default")]
    post_data: Option<PostData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NameValue {
    #[serde(deserialize_with = "lenient::string")]
    name: String,
    #[serde(deserialize_with = "lenient::string")]
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostData {
    #[serde(deserialize_with = "lenient::opt_string")]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Response {
    #[serde(deserialize_with = "lenient::opt_number")]
    status: Option<u32>,
    #[serde(deserialize_with = "lenient::or_default")]
    content: Option<Content>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Content {
    #[serde(deserialize_with = "lenient::opt_string")]
    mime_type: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    text: Option<String>,
}

fn is_noise_header(name: &str) -> bool {
    NOISE_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Flatten `log.entries` into candidate records.
///
/// Entries missing a request method, request URL or a response are dropped
/// with a warning; they never abort the whole archive.
pub(super) fn records(doc: &Value) -> Result<Vec<TrafficRecord>, FormatError> {
    let entries = doc
        .pointer("/log/entries")
        .and_then(Value::as_array)
        .ok_or(FormatError::MissingEntries)?;

    let mut out = Vec::with_capacity(entries.len());
    for (index, raw) in entries.iter().enumerate() {
        match record_from_entry(raw) {
            Some(record) => out.push(record),
            None => warn!(index, "skipping invalid HAR entry"),
        }
    }
    Ok(out)
}

fn record_from_entry(raw: &Value) -> Option<TrafficRecord> {
    let entry: Entry = serde_json::from_value(raw.clone()).ok()?;
    let request = entry.request?;
    let response = entry.response?;
    let method = request.method.filter(|m| !m.trim().is_empty())?;
    let url = request.url.filter(|u| !u.trim().is_empty())?;

    let mut record = TrafficRecord::new(method, url);
    for header in request.headers {
        if !is_noise_header(&header.name) {
            record.set_header(header.name, header.value);
        }
    }
    record.request_body = request
        .post_data
        .and_then(|p| p.text)
        .and_then(|text| tidy_body(&text));

    record.response_status = response
        .status
        .and_then(|s| u16::try_from(s).ok())
        .filter(|s| *s > 0);
    if let Some(content) = response.content {
        let is_json = content
            .mime_type
            .as_deref()
            .is_some_and(|m| m.contains("application/json"));
        if is_json {
            record.response_body = content.text.filter(|t| !t.is_empty());
        }
    }

    Some(record)
}
