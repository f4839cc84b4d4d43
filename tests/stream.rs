//! Integration tests for POST /api/chat/stream.
//!
//! Verifies that:
//! - The response is `text/event-stream` with caching disabled
//! - A reply is replayed as `status`, fixed-size `delta`s, then `done`
//! - Upstream failures become a single `error` event with no deltas
//! - Nothing follows the terminal event

use axum::body::Body;
use http::Request;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quickgpt::config::{
    ApiKey, Config, LoggingConfig, ProviderConfig, ProviderKind, RelayConfig, ServerConfig,
};
use quickgpt::proxy::{create_router, AppState};

/// One parsed SSE event: (event name, JSON data).
type SseEvent = (String, Value);

fn test_config(base_url: &str, api_key: Option<&str>, chunk_chars: usize) -> Config {
    Config {
        server: ServerConfig {
            listen: "127.0.0.1:0".to_string(),
        },
        provider: ProviderConfig {
            kind: ProviderKind::Groq,
            api_key: api_key.map(ApiKey::from),
            base_url: base_url.to_string(),
            text_model: "text-model".to_string(),
            vision_model: "vision-model".to_string(),
            vision_fallbacks: vec!["vision-model".to_string()],
            temperature: 0.7,
            max_tokens: 450,
            timeout_secs: 5,
        },
        relay: RelayConfig {
            chunk_chars,
            chunk_delay_ms: 1,
            max_duration_secs: 5,
        },
        logging: LoggingConfig::default(),
    }
}

async fn mock_reply(upstream: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(template)
        .mount(upstream)
        .await;
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    }))
}

/// Send a streaming request and return the response headers and parsed events.
async fn stream_chat(config: Config, body: Value) -> (http::HeaderMap, Vec<SseEvent>) {
    let app = create_router(AppState::new(config).expect("build state"));
    let request = Request::post("/api/chat/stream")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), http::StatusCode::OK);
    let headers = response.headers().clone();

    let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
        .await
        .expect("read body");
    let text = String::from_utf8(bytes.to_vec()).expect("utf-8 body");
    (headers, parse_sse(&text))
}

fn parse_sse(text: &str) -> Vec<SseEvent> {
    text.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .map(|block| {
            let mut name = String::new();
            let mut data = Value::Null;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    name = v.trim().to_string();
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = serde_json::from_str(v.trim()).expect("data is JSON");
                }
            }
            (name, data)
        })
        .collect()
}

fn hi() -> Value {
    json!({"messages": [{"role": "user", "content": "hi"}]})
}

#[tokio::test]
async fn test_stream_headers() {
    let upstream = MockServer::start().await;
    mock_reply(&upstream, completion("ok")).await;

    let (headers, _) = stream_chat(test_config(&upstream.uri(), Some("gsk-test"), 5), hi()).await;

    assert_eq!(headers.get("content-type").unwrap(), "text/event-stream");
    assert_eq!(headers.get("cache-control").unwrap(), "no-cache");
    assert_eq!(headers.get("connection").unwrap(), "keep-alive");
}

#[tokio::test]
async fn test_stream_hello_there_in_chunks_of_five() {
    let upstream = MockServer::start().await;
    mock_reply(&upstream, completion("Hello there")).await;

    let (_, events) = stream_chat(test_config(&upstream.uri(), Some("gsk-test"), 5), hi()).await;

    assert_eq!(
        events,
        vec![
            ("status".to_string(), json!({"stage": "calling_model"})),
            ("delta".to_string(), json!({"text": "Hello"})),
            ("delta".to_string(), json!({"text": " ther"})),
            ("delta".to_string(), json!({"text": "e"})),
            ("done".to_string(), json!({"ok": true})),
        ]
    );
}

#[tokio::test]
async fn test_stream_deltas_reassemble_reply() {
    let reply = "Rust streams are lazy: nothing happens until you poll them. ✨ Done.";
    let chunk_chars = 7;

    let upstream = MockServer::start().await;
    mock_reply(&upstream, completion(reply)).await;

    let (_, events) = stream_chat(
        test_config(&upstream.uri(), Some("gsk-test"), chunk_chars),
        hi(),
    )
    .await;

    let deltas: Vec<&str> = events
        .iter()
        .filter(|(name, _)| name == "delta")
        .map(|(_, data)| data["text"].as_str().unwrap())
        .collect();
    assert_eq!(deltas.len(), reply.chars().count().div_ceil(chunk_chars));
    assert_eq!(deltas.concat(), reply);

    assert_eq!(events.first().unwrap().0, "status");
    assert_eq!(events.last().unwrap().0, "done");
    assert_eq!(events.iter().filter(|(name, _)| name == "done").count(), 1);
}

#[tokio::test]
async fn test_stream_upstream_error_event() {
    let upstream = MockServer::start().await;
    mock_reply(
        &upstream,
        ResponseTemplate::new(429).set_body_json(json!({"error": {"message": "rate limited"}})),
    )
    .await;

    let (_, events) = stream_chat(test_config(&upstream.uri(), Some("gsk-test"), 5), hi()).await;

    assert_eq!(
        events,
        vec![
            ("status".to_string(), json!({"stage": "calling_model"})),
            (
                "error".to_string(),
                json!({"message": "Groq 429: rate limited"})
            ),
        ]
    );
}

#[tokio::test]
async fn test_stream_missing_api_key_error_event() {
    let upstream = MockServer::start().await;

    let (_, events) = stream_chat(test_config(&upstream.uri(), None, 5), hi()).await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[1].0, "error");
    assert_eq!(
        events[1].1["message"],
        "Missing GROQ_API_KEY in environment"
    );
    assert!(events.iter().all(|(name, _)| name != "delta"));
}
