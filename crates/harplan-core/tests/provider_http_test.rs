//! `OpenAiClient` against an in-process HTTP server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Json, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use serde_json::{Value, json};

use harplan_core::provider::{
    ChatClient, ChatMessage, ChatRequest, OpenAiClient, ProviderConfig, ProviderError,
};

struct Mock {
    status: StatusCode,
    reply: String,
    delay: Option<Duration>,
    seen: Mutex<Vec<Seen>>,
}

struct Seen {
    headers: HeaderMap,
    query: Option<String>,
    body: Value,
}

impl Mock {
    fn new(status: StatusCode, reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            status,
            reply: reply.into(),
            delay: None,
            seen: Mutex::new(Vec::new()),
        })
    }
}

fn completion(content: &str) -> String {
    json!({ "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }] })
        .to_string()
}

async fn handler(
    State(mock): State<Arc<Mock>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    mock.seen.lock().unwrap().push(Seen { headers, query, body });
    if let Some(delay) = mock.delay {
        tokio::time::sleep(delay).await;
    }
    (mock.status, mock.reply.clone())
}

/// Serve `mock` on an ephemeral port and return its `/v1` base URL.
async fn spawn(mock: Arc<Mock>) -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(handler))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1")
}

fn client(endpoint: String, model: &str) -> OpenAiClient {
    OpenAiClient::new(ProviderConfig {
        endpoint,
        api_key: "sk-test".into(),
        model: model.into(),
        ..ProviderConfig::default()
    })
    .unwrap()
}

fn request() -> ChatRequest {
    ChatRequest {
        messages: vec![ChatMessage::system("sys"), ChatMessage::user("generate")],
        max_tokens: 512,
        json_response: true,
    }
}

#[tokio::test]
async fn sends_credentials_and_returns_content() {
    let mock = Mock::new(StatusCode::OK, completion("{\"stories\": []}"));
    let base = spawn(mock.clone()).await;
    let mut config = client(base, "gpt-4o").config().clone();
    config.api_version = Some("2024-02-01".into());
    let client = OpenAiClient::new(config).unwrap();

    let reply = client.complete(&request()).await.unwrap();
    assert_eq!(reply, "{\"stories\": []}");

    let seen = mock.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let call = &seen[0];
    assert_eq!(call.headers["api-key"], "sk-test");
    assert_eq!(call.headers["authorization"], "Bearer sk-test");
    assert_eq!(call.query.as_deref(), Some("api-version=2024-02-01"));
    assert_eq!(call.body["model"], "gpt-4o");
    assert_eq!(call.body["max_tokens"], 512);
    assert_eq!(call.body["response_format"]["type"], "json_object");
    assert_eq!(call.body["messages"][1]["content"], "generate");
}

#[tokio::test]
async fn reasoning_models_use_completion_token_limit() {
    let mock = Mock::new(StatusCode::OK, completion("ok"));
    let client = client(spawn(mock.clone()).await, "o3-mini");

    client.complete(&request()).await.unwrap();

    let seen = mock.seen.lock().unwrap();
    let body = &seen[0].body;
    assert_eq!(body["max_completion_tokens"], 512);
    assert_eq!(body["reasoning_effort"], "low");
    assert!(body.get("temperature").is_none());
    assert!(seen[0].query.is_none());
}

#[tokio::test]
async fn maps_error_statuses() {
    let cases = [
        (StatusCode::UNAUTHORIZED, "invalid-key"),
        (StatusCode::TOO_MANY_REQUESTS, "rate-limit"),
        (StatusCode::INTERNAL_SERVER_ERROR, "http"),
    ];
    for (status, label) in cases {
        let client = client(spawn(Mock::new(status, "boom")).await, "gpt-4o");
        let err = client.complete(&request()).await.unwrap_err();
        let ok = match label {
            "invalid-key" => matches!(err, ProviderError::InvalidKey),
            "rate-limit" => matches!(err, ProviderError::RateLimit),
            _ => matches!(err, ProviderError::Http { status: 500, ref body } if body == "boom"),
        };
        assert!(ok, "{status}: unexpected {err:?}");
    }
}

#[tokio::test]
async fn empty_and_malformed_bodies() {
    let empty = client(
        spawn(Mock::new(StatusCode::OK, json!({ "choices": [] }).to_string())).await,
        "gpt-4o",
    );
    assert!(matches!(
        empty.complete(&request()).await,
        Err(ProviderError::EmptyReply)
    ));

    let blank = client(spawn(Mock::new(StatusCode::OK, completion("  "))).await, "gpt-4o");
    assert!(matches!(
        blank.complete(&request()).await,
        Err(ProviderError::EmptyReply)
    ));

    let garbage = client(spawn(Mock::new(StatusCode::OK, "<html>")).await, "gpt-4o");
    assert!(matches!(
        garbage.complete(&request()).await,
        Err(ProviderError::Malformed(_))
    ));
}

#[tokio::test]
async fn ping_sends_small_plain_request() {
    let mock = Mock::new(StatusCode::OK, completion("Hello!"));
    let client = client(spawn(mock.clone()).await, "gpt-4o");

    assert_eq!(client.ping().await.unwrap(), "Hello!");

    let seen = mock.seen.lock().unwrap();
    let body = &seen[0].body;
    assert_eq!(body["max_tokens"], 100);
    assert!(body.get("response_format").is_none());
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn slow_server_times_out() {
    let mock = Arc::new(Mock {
        status: StatusCode::OK,
        reply: completion("late"),
        delay: Some(Duration::from_secs(3)),
        seen: Mutex::new(Vec::new()),
    });
    let base = spawn(mock).await;
    let client = OpenAiClient::new(ProviderConfig {
        endpoint: base,
        api_key: "sk-test".into(),
        timeout_secs: Some(1),
        ..ProviderConfig::default()
    })
    .unwrap();

    assert!(matches!(
        client.complete(&request()).await,
        Err(ProviderError::Timeout)
    ));
}

#[tokio::test]
async fn unreachable_endpoint_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(format!("http://{addr}/v1"), "gpt-4o");
    assert!(matches!(
        client.complete(&request()).await,
        Err(ProviderError::Network(_))
    ));
}
