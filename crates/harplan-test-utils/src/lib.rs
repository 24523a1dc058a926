//! Shared test utilities for harplan integration tests.
//!
//! Provides builders for HAR archives and Postman collections, and a
//! scripted [`ChatClient`] that replays canned replies without touching the
//! network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use harplan_core::provider::{ChatClient, ChatRequest, ProviderError};

// ---------------------------------------------------------------------------
// HAR
// ---------------------------------------------------------------------------

/// Builds a HAR 1.2 document entry by entry.
#[derive(Debug, Default, Clone)]
pub struct HarBuilder {
    entries: Vec<Value>,
}

impl HarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request with a `200 application/json` response and no body.
    pub fn entry(self, method: &str, url: &str) -> Self {
        self.exchange(method, url, None, 200, Some("{}"))
    }

    /// Add a request with a JSON request body.
    pub fn json_entry(self, method: &str, url: &str, body: Value, status: u16) -> Self {
        let text = body.to_string();
        self.exchange(method, url, Some(&text), status, Some("{}"))
    }

    /// Add a fully specified exchange.
    pub fn exchange(
        mut self,
        method: &str,
        url: &str,
        request_body: Option<&str>,
        status: u16,
        response_json: Option<&str>,
    ) -> Self {
        let mut request = json!({
            "method": method,
            "url": url,
            "httpVersion": "HTTP/1.1",
            "headers": [
                { "name": "Accept", "value": "application/json" },
                { "name": "User-Agent", "value": "Mozilla/5.0" }
            ],
            "queryString": [],
        });
        if let Some(text) = request_body {
            request["postData"] = json!({ "mimeType": "application/json", "text": text });
        }
        let content = match response_json {
            Some(text) => json!({ "mimeType": "application/json", "text": text }),
            None => json!({ "mimeType": "text/html" }),
        };
        self.entries.push(json!({
            "startedDateTime": "2024-01-01T00:00:00.000Z",
            "request": request,
            "response": { "status": status, "content": content },
        }));
        self
    }

    /// Add an arbitrary raw entry, e.g. a malformed one.
    pub fn raw(mut self, entry: Value) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn build(&self) -> Value {
        json!({
            "log": {
                "version": "1.2",
                "creator": { "name": "harplan-test-utils", "version": "0" },
                "entries": self.entries,
            }
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.build()).expect("HAR document serializes")
    }
}

// ---------------------------------------------------------------------------
// Postman
// ---------------------------------------------------------------------------

/// Wrap `items` in a Postman v2.1 collection.
pub fn postman_v2_collection(items: Value) -> Value {
    json!({
        "info": {
            "_postman_id": "00000000-0000-0000-0000-000000000000",
            "name": "fixture",
            "schema": "https://schema.getpostman.com/json/collection/v2.1.0/collection.json"
        },
        "item": items,
    })
}

/// A v2 request item with a raw URL.
pub fn postman_request(name: &str, method: &str, url: &str) -> Value {
    json!({
        "name": name,
        "request": { "method": method, "header": [], "url": { "raw": url } }
    })
}

// ---------------------------------------------------------------------------
// Model replies
// ---------------------------------------------------------------------------

/// A `{"stories": [...]}` reply with one test case per story.
pub fn stories_reply(stories: &[(&str, &str)]) -> String {
    let stories: Vec<Value> = stories
        .iter()
        .map(|(id, case_id)| {
            json!({
                "id": id,
                "title": format!("Story {id}"),
                "description": "",
                "testCases": [{
                    "id": case_id,
                    "title": format!("Case {case_id}"),
                    "steps": ["send request"],
                    "expectedResult": "ok",
                    "apiDetails": { "method": "GET", "endpoint": "/api/x", "expectedStatus": 200 }
                }]
            })
        })
        .collect();
    json!({ "stories": stories }).to_string()
}

// ---------------------------------------------------------------------------
// Scripted client
// ---------------------------------------------------------------------------

/// A [`ChatClient`] that replays scripted results in order and records
/// every request it receives. Once the script runs out it answers
/// [`ProviderError::EmptyReply`].
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Only successful replies.
    pub fn replying<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }

    /// The user prompt of every request received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| r.prompt().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(request.clone());
        self.replies
            .lock()
            .expect("replies lock poisoned")
            .pop_front()
            .unwrap_or(Err(ProviderError::EmptyReply))
    }
}
