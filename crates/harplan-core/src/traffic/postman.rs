//! Postman collection flattening (schema v1 and v2.x).
//!
//! v2 collections nest requests inside folders (`item` arrays of arbitrary
//! depth); v1 collections keep a flat `requests` array. Both are reduced to
//! leaf requests with a resolved URL, a header map and an optional body.

use serde_json::{Map, Value};

use super::{FormatError, TrafficRecord, tidy_body};

enum Version {
    V1,
    V2,
}

fn schema(doc: &Value) -> &str {
    doc.pointer("/info/schema")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn has_postman_id(doc: &Value) -> bool {
    doc.pointer("/info/_postman_id").is_some() || doc.pointer("/info/postman_id").is_some()
}

/// Whether a document carries Postman collection markers.
pub(super) fn looks_like_collection(doc: &Value) -> bool {
    schema(doc).contains("postman") || has_postman_id(doc)
}

fn version(doc: &Value) -> Result<Version, FormatError> {
    let schema = schema(doc);
    if schema.contains("v2") {
        Ok(Version::V2)
    } else if schema.contains("v1") || has_postman_id(doc) {
        Ok(Version::V1)
    } else if doc.get("item").is_some_and(Value::is_array) {
        Ok(Version::V2)
    } else if doc.get("requests").is_some_and(Value::is_array) {
        Ok(Version::V1)
    } else {
        Err(FormatError::UnsupportedPostmanVersion)
    }
}

/// Flatten a collection into candidate records, folders first-to-last.
pub(super) fn records(doc: &Value) -> Result<Vec<TrafficRecord>, FormatError> {
    let mut out = Vec::new();
    match version(doc)? {
        Version::V2 => flatten_v2(array(doc.get("item")), &mut out),
        Version::V1 => {
            for request in array(doc.get("requests")) {
                out.push(request_v1(request));
            }
        }
    }
    Ok(out)
}

fn array(value: Option<&Value>) -> &[Value] {
    value.and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default()
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn is_disabled(entry: &Value) -> bool {
    entry.get("disabled").and_then(Value::as_bool).unwrap_or(false)
}

/// `key=value` pairs joined with `&`, skipping disabled entries.
fn join_pairs(pairs: &[Value]) -> String {
    pairs
        .iter()
        .filter(|p| !is_disabled(p))
        .map(|p| format!("{}={}", text(p.get("key")), text(p.get("value"))))
        .collect::<Vec<_>>()
        .join("&")
}

// ---------------------------------------------------------------------------
// v2
// ---------------------------------------------------------------------------

fn flatten_v2(items: &[Value], out: &mut Vec<TrafficRecord>) {
    for item in items {
        if let Some(children) = item.get("item").and_then(Value::as_array) {
            flatten_v2(children, out);
        } else if let Some(request) = item.get("request") {
            out.push(request_v2(request));
        }
    }
}

fn request_v2(request: &Value) -> TrafficRecord {
    // A v2 request may be shorthand for `GET <url>`.
    if let Value::String(url) = request {
        return TrafficRecord::new("GET", url.clone());
    }

    let method = request
        .get("method")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or("GET");

    let url = match request.get("url") {
        Some(Value::String(raw)) => raw.clone(),
        Some(Value::Object(obj)) => match obj.get("raw").and_then(Value::as_str) {
            Some(raw) if !raw.is_empty() => raw.to_string(),
            _ => format_url_object(obj),
        },
        _ => String::new(),
    };

    let mut record = TrafficRecord::new(method, url);
    for header in array(request.get("header")) {
        if !is_disabled(header) {
            record.set_header(text(header.get("key")), text(header.get("value")));
        }
    }
    record.request_body = request
        .get("body")
        .and_then(body_v2)
        .and_then(|b| tidy_body(&b));
    record
}

/// Build a URL string from a structured `{protocol, host, path, query}`.
fn format_url_object(obj: &Map<String, Value>) -> String {
    let protocol = obj
        .get("protocol")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .unwrap_or("https");

    let host = match obj.get("host") {
        Some(Value::Array(parts)) => parts
            .iter()
            .map(|p| text(Some(p)))
            .collect::<Vec<_>>()
            .join("."),
        other => text(other),
    };

    let path = match obj.get("path") {
        Some(Value::Array(parts)) => {
            let segments: Vec<String> = parts
                .iter()
                .map(|p| match p {
                    Value::Object(seg) => text(seg.get("value")),
                    other => text(Some(other)),
                })
                .collect();
            format!("/{}", segments.join("/"))
        }
        other => {
            let path = text(other);
            if path.is_empty() || path.starts_with('/') {
                path
            } else {
                format!("/{path}")
            }
        }
    };

    let query = join_pairs(array(obj.get("query")));
    let port = match obj.get("port") {
        Some(p) if !text(Some(p)).is_empty() => format!(":{}", text(Some(p))),
        _ => String::new(),
    };

    if query.is_empty() {
        format!("{protocol}://{host}{port}{path}")
    } else {
        format!("{protocol}://{host}{port}{path}?{query}")
    }
}

/// Extract a body from `raw`, `urlencoded` or `formdata` mode.
///
/// When `mode` is absent the first populated mode wins, in that order.
fn body_v2(body: &Value) -> Option<String> {
    let pick = |mode: &str| match mode {
        "raw" => body.get("raw").and_then(Value::as_str).map(str::to_string),
        "urlencoded" | "formdata" => body
            .get(mode)
            .and_then(Value::as_array)
            .map(|pairs| join_pairs(pairs)),
        _ => None,
    };
    match body.get("mode").and_then(Value::as_str) {
        Some(mode) => pick(mode),
        None => ["raw", "urlencoded", "formdata"].into_iter().find_map(pick),
    }
}

// ---------------------------------------------------------------------------
// v1
// ---------------------------------------------------------------------------

fn request_v1(request: &Value) -> TrafficRecord {
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or("GET");
    let mut record = TrafficRecord::new(method, text(request.get("url")));

    match request.get("headers") {
        // v1 stores headers as "Name: value" lines.
        Some(Value::String(lines)) => {
            for line in lines.lines() {
                if let Some((name, value)) = line.split_once(':') {
                    record.set_header(name.trim(), value.trim());
                }
            }
        }
        Some(Value::Object(map)) => {
            for (name, value) in map {
                record.set_header(name.clone(), text(Some(value)));
            }
        }
        Some(Value::Array(entries)) => {
            for entry in entries {
                if !is_disabled(entry) {
                    record.set_header(text(entry.get("key")), text(entry.get("value")));
                }
            }
        }
        _ => {}
    }

    let body = match (request.get("rawModeData"), request.get("data")) {
        (Some(Value::String(raw)), _) if !raw.is_empty() => Some(raw.clone()),
        (_, Some(Value::String(data))) => Some(data.clone()),
        (_, Some(Value::Array(pairs))) => Some(join_pairs(pairs)),
        _ => None,
    };
    record.request_body = body.and_then(|b| tidy_body(&b));
    record
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const V2_SCHEMA: &str = "https://schema.getpostman.com/json/collection/v2.1.0/collection.json";

    #[test]
    fn flattens_nested_folders() {
        let doc = json!({
            "info": { "schema": V2_SCHEMA },
            "item": [{
                "name": "Users",
                "item": [{
                    "name": "Admin",
                    "item": [{
                        "name": "Create user",
                        "request": {
                            "method": "post",
                            "url": "{{base_url}}/api/users",
                            "header": [{ "key": "Content-Type", "value": "application/json" }],
                            "body": { "mode": "raw", "raw": "{\"name\":\"x\"}" }
                        }
                    }]
                }]
            }, {
                "name": "Health",
                "request": "https://example.com/api/health"
            }]
        });
        let records = records(&doc).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].method, "POST");
        assert_eq!(records[0].url, "{{base_url}}/api/users");
        assert_eq!(records[0].header("content-type"), Some("application/json"));
        assert_eq!(records[0].request_body.as_deref(), Some("{\n  \"name\": \"x\"\n}"));
        assert_eq!(records[1].method, "GET");
    }

    #[test]
    fn formats_structured_url() {
        let doc = json!({
            "info": { "schema": V2_SCHEMA },
            "item": [{
                "request": {
                    "method": "GET",
                    "url": {
                        "protocol": "http",
                        "host": ["api", "example", "com"],
                        "path": ["v1", "items"],
                        "query": [{ "key": "page", "value": "2" }, { "key": "size", "value": 10 }]
                    }
                }
            }]
        });
        let records = records(&doc).unwrap();
        assert_eq!(records[0].url, "http://api.example.com/v1/items?page=2&size=10");
    }

    #[test]
    fn raw_url_wins_over_structured_parts() {
        let doc = json!({
            "info": { "schema": V2_SCHEMA },
            "item": [{ "request": { "method": "GET", "url": { "raw": "https://x.io/api/a", "host": ["y", "io"] } } }]
        });
        assert_eq!(records(&doc).unwrap()[0].url, "https://x.io/api/a");
    }

    #[test]
    fn urlencoded_and_formdata_bodies() {
        let urlencoded = json!({ "mode": "urlencoded", "urlencoded": [
            { "key": "a", "value": "1" }, { "key": "b", "value": "2", "disabled": true }
        ]});
        assert_eq!(body_v2(&urlencoded).as_deref(), Some("a=1"));

        let formdata = json!({ "mode": "formdata", "formdata": [{ "key": "file", "value": "x" }] });
        assert_eq!(body_v2(&formdata).as_deref(), Some("file=x"));

        let modeless = json!({ "formdata": [{ "key": "f", "value": "1" }], "raw": "r" });
        assert_eq!(body_v2(&modeless).as_deref(), Some("r"));
    }

    #[test]
    fn v1_collection_with_header_lines() {
        let doc = json!({
            "info": { "_postman_id": "abc", "schema": "https://schema.getpostman.com/json/collection/v1.0.0/collection.json" },
            "requests": [{
                "method": "PUT",
                "url": "https://example.com/api/items/1",
                "headers": "Content-Type: application/json\nX-Trace: 7\n",
                "rawModeData": "{\"qty\":2}"
            }, {
                "method": "POST",
                "url": "https://example.com/api/login",
                "data": [{ "key": "user", "value": "u" }, { "key": "pass", "value": "p" }]
            }]
        });
        let records = records(&doc).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].header("x-trace"), Some("7"));
        assert_eq!(records[0].request_body.as_deref(), Some("{\n  \"qty\": 2\n}"));
        assert_eq!(records[1].request_body.as_deref(), Some("user=u&pass=p"));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let doc = json!({ "info": { "schema": "https://example.com/postman/v9" } });
        assert!(matches!(records(&doc), Err(FormatError::UnsupportedPostmanVersion)));
    }
}
